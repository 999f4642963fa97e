//! Party roles, contact addresses and the per-request contacts table.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PartyError {
    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("contacts table is missing required role: {0}")]
    MissingRole(Role),

    #[error("invalid phone number: {0}")]
    InvalidPhoneNumber(String),
}

/// The fixed set of parties a relay recognizes.
///
/// Role names double as the wire representation in request bodies and as the
/// speaker tag prefixed to relayed message bodies. Unknown names are rejected
/// at the boundary instead of falling through to a failed address lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Client,
    #[serde(rename = "Content Producer")]
    ContentProducer,
    #[serde(rename = "Project Manager")]
    ProjectManager,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Client, Role::ContentProducer, Role::ProjectManager];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::ContentProducer => "Content Producer",
            Role::ProjectManager => "Project Manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PartyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| PartyError::UnknownRole(s.to_string()))
    }
}

/// An E.164-shaped contact address: `+` followed by 8 to 15 digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(raw: &str) -> Result<Self, PartyError> {
        let digits = raw
            .strip_prefix('+')
            .ok_or_else(|| PartyError::InvalidPhoneNumber(raw.to_string()))?;
        if digits.len() < 8 || digits.len() > 15 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PartyError::InvalidPhoneNumber(raw.to_string()));
        }
        Ok(PhoneNumber(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = PartyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhoneNumber::new(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PartyError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        PhoneNumber::new(&raw)
    }
}

impl From<PhoneNumber> for String {
    fn from(number: PhoneNumber) -> Self {
        number.0
    }
}

/// Role-to-address table supplied with every alias-mode request.
///
/// Backed by an insertion-ordered map so broadcast order and reverse lookups
/// are deterministic across identical requests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contacts(IndexMap<Role, PhoneNumber>);

impl Contacts {
    pub fn new() -> Self {
        Contacts(IndexMap::new())
    }

    pub fn insert(&mut self, role: Role, number: PhoneNumber) {
        self.0.insert(role, number);
    }

    pub fn get(&self, role: Role) -> Option<&PhoneNumber> {
        self.0.get(&role)
    }

    /// Checks that every known role has an address, reporting the first
    /// missing one in declaration order.
    pub fn require_all(&self) -> Result<(), PartyError> {
        for role in Role::ALL {
            if !self.0.contains_key(&role) {
                return Err(PartyError::MissingRole(role));
            }
        }
        Ok(())
    }

    /// Reverse lookup from address to role. If the same address is registered
    /// under several roles, the first one in table order wins.
    pub fn role_of(&self, number: &PhoneNumber) -> Option<Role> {
        self.0
            .iter()
            .find(|(_, candidate)| *candidate == number)
            .map(|(role, _)| *role)
    }

    /// Every entry except the given role, in table order. This is the
    /// broadcast set for an inbound group forward.
    pub fn others(&self, role: Role) -> impl Iterator<Item = (Role, &PhoneNumber)> {
        self.0
            .iter()
            .filter(move |(candidate, _)| **candidate != role)
            .map(|(candidate, number)| (*candidate, number))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &PhoneNumber)> {
        self.0.iter().map(|(role, number)| (*role, number))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Boundary conversion for request bodies: role names and addresses arrive as
/// plain strings and are rejected here, with a typed error, before any
/// handler logic runs.
impl TryFrom<&IndexMap<String, String>> for Contacts {
    type Error = PartyError;

    fn try_from(raw: &IndexMap<String, String>) -> Result<Self, Self::Error> {
        let mut contacts = Contacts::new();
        for (name, address) in raw {
            contacts.insert(name.parse()?, PhoneNumber::new(address)?);
        }
        Ok(contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(raw: &str) -> PhoneNumber {
        PhoneNumber::new(raw).unwrap()
    }

    fn full_table() -> Contacts {
        let mut contacts = Contacts::new();
        contacts.insert(Role::ContentProducer, number("+15550000001"));
        contacts.insert(Role::Client, number("+15550000002"));
        contacts.insert(Role::ProjectManager, number("+15550000003"));
        contacts
    }

    #[test]
    fn role_round_trips_through_wire_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!(
            "Producer".parse::<Role>(),
            Err(PartyError::UnknownRole("Producer".into()))
        );
    }

    #[test]
    fn role_deserializes_as_map_key() {
        let contacts: Contacts = serde_json::from_str(
            r#"{"Content Producer": "+15550000001", "Client": "+15550000002", "Project Manager": "+15550000003"}"#,
        )
        .unwrap();
        assert_eq!(contacts.get(Role::Client), Some(&number("+15550000002")));
        assert!(contacts.require_all().is_ok());
    }

    #[test]
    fn phone_number_validation() {
        assert!(PhoneNumber::new("+15550000001").is_ok());
        assert!(PhoneNumber::new("15550000001").is_err());
        assert!(PhoneNumber::new("+1555").is_err());
        assert!(PhoneNumber::new("+1555000000a").is_err());
        assert!(PhoneNumber::new("+1234567890123456").is_err());
    }

    #[test]
    fn require_all_names_first_missing_role() {
        let mut contacts = Contacts::new();
        contacts.insert(Role::ProjectManager, number("+15550000003"));
        assert_eq!(
            contacts.require_all(),
            Err(PartyError::MissingRole(Role::Client))
        );
    }

    #[test]
    fn reverse_lookup_prefers_declaration_order() {
        let mut contacts = Contacts::new();
        contacts.insert(Role::ContentProducer, number("+15550000009"));
        contacts.insert(Role::Client, number("+15550000009"));
        assert_eq!(
            contacts.role_of(&number("+15550000009")),
            Some(Role::ContentProducer)
        );
        assert_eq!(contacts.role_of(&number("+15550000000")), None);
    }

    #[test]
    fn raw_table_conversion_rejects_unknown_roles() {
        let mut raw = IndexMap::new();
        raw.insert("Client".to_string(), "+15550000002".to_string());
        raw.insert("Producer".to_string(), "+15550000001".to_string());
        assert_eq!(
            Contacts::try_from(&raw),
            Err(PartyError::UnknownRole("Producer".into()))
        );

        raw.shift_remove("Producer");
        raw.insert("Content Producer".to_string(), "bogus".to_string());
        assert_eq!(
            Contacts::try_from(&raw),
            Err(PartyError::InvalidPhoneNumber("bogus".into()))
        );
    }

    #[test]
    fn others_excludes_the_sender() {
        let contacts = full_table();
        let recipients: Vec<Role> = contacts.others(Role::Client).map(|(role, _)| role).collect();
        assert_eq!(recipients, vec![Role::ContentProducer, Role::ProjectManager]);
    }
}
