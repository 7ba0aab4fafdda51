use std::fmt;

use serde::{Deserialize, Serialize};

/// A normalized identity: display name plus e-mail address.
///
/// Either field may be empty. When free text cannot be split into both a
/// name and an address, the whole text is kept as the name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl Person {
    /// Create a person from explicit parts.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Parse a free-text identity of the form `Display Name <email>`.
    ///
    /// Also accepts the `email (Display Name)` comment form. If parsing does
    /// not yield both a name and an address, the entire original text
    /// becomes the name and the address is empty. Never fails.
    pub fn from_identity(text: &str) -> Self {
        match split_address(text) {
            Some((name, email)) if !name.is_empty() && !email.is_empty() => Self { name, email },
            _ => Self {
                name: text.to_string(),
                email: String::new(),
            },
        }
    }

    /// Git-style rendering: `name <email>`.
    pub fn to_git_bytes(&self) -> Vec<u8> {
        format!("{} <{}>", self.name, self.email).into_bytes()
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

fn split_address(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    if let Some(open) = text.rfind('<') {
        let close = open + text[open..].find('>')?;
        let name = unquote(text[..open].trim());
        let email = text[open + 1..close].trim().to_string();
        return Some((name, email));
    }
    if text.ends_with(')') {
        let open = text.find('(')?;
        let email = text[..open].trim().to_string();
        let name = text[open + 1..text.len() - 1].trim().to_string();
        return Some((name, email));
    }
    None
}

fn unquote(s: &str) -> String {
    let inner = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s);
    inner.replace("\\\"", "\"")
}
