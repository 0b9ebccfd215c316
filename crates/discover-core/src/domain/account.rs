use serde::{Deserialize, Serialize};

/// A user registered with the service, as kept by the relational store.
///
/// Presence of an account means the user is onboarded: the periodic seed and
/// the extraction schedule both enumerate accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    /// Where suggestions are mailed; accounts without one are not mailed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
