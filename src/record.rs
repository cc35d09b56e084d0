//! Canonical identity/contact record and dedup key derivation.

use serde::{Deserialize, Serialize};

use crate::decode::clean::clean_text;

/// Grammar that produced a record.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    #[default]
    Unknown,
    Markup,
    SecureQr,
    Json,
    KeyValue,
    Delimited,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Unknown => "unknown",
            Source::Markup => "markup",
            Source::SecureQr => "secure_qr",
            Source::Json => "json",
            Source::KeyValue => "key_value",
            Source::Delimited => "delimited",
        }
    }
}

/// Flat identity/contact record.
///
/// Every attribute is a string; a missing attribute is the empty string.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Record {
    pub uid: String,
    pub reference_id: String,
    pub name: String,
    pub username: String,
    pub dob: String,
    pub yob: String,
    pub age: String,
    pub gender: String,
    pub care_of: String,
    pub address: String,
    pub postal_code: String,
    pub state: String,
    pub district: String,
    pub mobile: String,
    pub email: String,
    pub source: Source,
    /// Epoch milliseconds of the last store write, 0 before the first one.
    pub last_seen: u64,
}

impl Record {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Attribute names in declaration order.
    pub const FIELD_NAMES: [&'static str; 15] = [
        "uid",
        "reference_id",
        "name",
        "username",
        "dob",
        "yob",
        "age",
        "gender",
        "care_of",
        "address",
        "postal_code",
        "state",
        "district",
        "mobile",
        "email",
    ];

    pub fn fields(&self) -> [&str; 15] {
        [
            self.uid.as_str(),
            self.reference_id.as_str(),
            self.name.as_str(),
            self.username.as_str(),
            self.dob.as_str(),
            self.yob.as_str(),
            self.age.as_str(),
            self.gender.as_str(),
            self.care_of.as_str(),
            self.address.as_str(),
            self.postal_code.as_str(),
            self.state.as_str(),
            self.district.as_str(),
            self.mobile.as_str(),
            self.email.as_str(),
        ]
    }

    pub fn fields_mut(&mut self) -> [&mut String; 15] {
        [
            &mut self.uid,
            &mut self.reference_id,
            &mut self.name,
            &mut self.username,
            &mut self.dob,
            &mut self.yob,
            &mut self.age,
            &mut self.gender,
            &mut self.care_of,
            &mut self.address,
            &mut self.postal_code,
            &mut self.state,
            &mut self.district,
            &mut self.mobile,
            &mut self.email,
        ]
    }

    /// Look up an attribute by name. Unknown names read as empty.
    pub fn get(&self, name: &str) -> &str {
        Self::FIELD_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|index| self.fields()[index])
            .unwrap_or("")
    }

    /// True when no attribute carries a value.
    pub fn is_blank(&self) -> bool {
        self.fields().iter().all(|value| value.is_empty())
    }

    /// Collapse whitespace and trim every attribute in place.
    pub fn clean(&mut self) {
        for field in self.fields_mut() {
            let cleaned = clean_text(field.as_str());
            *field = cleaned;
        }
    }

    /// Field-wise merge: a non-blank incoming value wins, a blank one never
    /// erases what is already known.
    pub fn merge_from(&mut self, incoming: &Record) {
        for (stored, fresh) in self.fields_mut().into_iter().zip(incoming.fields()) {
            if !fresh.is_empty() {
                *stored = fresh.to_string();
            }
        }
        if incoming.source != Source::Unknown {
            self.source = incoming.source;
        }
    }

    /// Person name for composite keys: the formal name first, then the username.
    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }

    fn birth_marker(&self) -> &str {
        if self.dob.is_empty() {
            &self.yob
        } else {
            &self.dob
        }
    }

    /// Derive the dedup key for this record under a deployment profile.
    ///
    /// Returns `None` when no identity-bearing field is set.
    pub fn dedup_key(&self, profile: KeyProfile) -> Option<String> {
        profile
            .order()
            .iter()
            .find_map(|component| component.derive(self))
    }
}

/// Deployment profile selecting the dedup key priority.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyProfile {
    /// Government ID deployments: unique id first.
    #[default]
    Identity,
    /// Contact-card deployments: email and phone first.
    Contact,
}

impl KeyProfile {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" => Some(KeyProfile::Identity),
            "contact" => Some(KeyProfile::Contact),
            _ => None,
        }
    }

    fn order(&self) -> &'static [KeyComponent] {
        match self {
            KeyProfile::Identity => &[
                KeyComponent::Uid,
                KeyComponent::Reference,
                KeyComponent::Mobile,
                KeyComponent::Email,
                KeyComponent::NameBirth,
            ],
            KeyProfile::Contact => &[
                KeyComponent::Email,
                KeyComponent::Mobile,
                KeyComponent::NameBirth,
                KeyComponent::Uid,
                KeyComponent::Reference,
            ],
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum KeyComponent {
    Uid,
    Reference,
    Mobile,
    Email,
    NameBirth,
}

impl KeyComponent {
    fn derive(&self, record: &Record) -> Option<String> {
        match self {
            KeyComponent::Uid => prefixed("uid", &compact(&record.uid)),
            KeyComponent::Reference => prefixed("ref", &compact(&record.reference_id)),
            KeyComponent::Mobile => prefixed("mobile", &compact(&record.mobile)),
            KeyComponent::Email => prefixed("email", &record.email.trim().to_lowercase()),
            KeyComponent::NameBirth => {
                let name = clean_text(record.display_name()).to_lowercase();
                let birth = clean_text(record.birth_marker());
                if name.is_empty() || birth.is_empty() {
                    None
                } else {
                    Some(format!("name:{}|{}", name, birth))
                }
            }
        }
    }
}

fn compact(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

fn prefixed(prefix: &str, value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(format!("{}:{}", prefix, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(email: &str, mobile: &str) -> Record {
        Record {
            username: "Jane Doe".to_string(),
            dob: "1990-01-01".to_string(),
            email: email.to_string(),
            mobile: mobile.to_string(),
            ..Record::new(Source::KeyValue)
        }
    }

    #[test]
    fn identity_profile_prefers_uid() {
        let mut record = contact("jane@x.com", "9990001111");
        record.uid = "1234 5678 9012".to_string();
        assert_eq!(
            record.dedup_key(KeyProfile::Identity).as_deref(),
            Some("uid:123456789012")
        );
        assert_eq!(
            record.dedup_key(KeyProfile::Contact).as_deref(),
            Some("email:jane@x.com")
        );
    }

    #[test]
    fn identity_profile_falls_back_through_contact_fields() {
        let record = contact("", "9990001111");
        assert_eq!(
            record.dedup_key(KeyProfile::Identity).as_deref(),
            Some("mobile:9990001111")
        );

        let record = contact("Jane@X.com", "");
        assert_eq!(
            record.dedup_key(KeyProfile::Identity).as_deref(),
            Some("email:jane@x.com")
        );
    }

    #[test]
    fn name_composite_needs_a_birth_marker() {
        let mut record = contact("", "");
        assert_eq!(
            record.dedup_key(KeyProfile::Identity).as_deref(),
            Some("name:jane doe|1990-01-01")
        );

        record.dob.clear();
        assert_eq!(record.dedup_key(KeyProfile::Identity), None);

        record.yob = "1990".to_string();
        assert_eq!(
            record.dedup_key(KeyProfile::Contact).as_deref(),
            Some("name:jane doe|1990")
        );
    }

    #[test]
    fn blank_record_has_no_key() {
        let record = Record::new(Source::Json);
        assert!(record.is_blank());
        assert_eq!(record.dedup_key(KeyProfile::Identity), None);
        assert_eq!(record.dedup_key(KeyProfile::Contact), None);
    }

    #[test]
    fn merge_keeps_known_values_when_incoming_is_blank() {
        let mut stored = contact("jane@x.com", "9990001111");
        let incoming = Record {
            email: "jane@x.com".to_string(),
            gender: "Female".to_string(),
            ..Record::new(Source::Json)
        };
        stored.merge_from(&incoming);

        assert_eq!(stored.mobile, "9990001111");
        assert_eq!(stored.username, "Jane Doe");
        assert_eq!(stored.gender, "Female");
        assert_eq!(stored.source, Source::Json);
    }

    #[test]
    fn get_reads_fields_by_name() {
        let record = contact("jane@x.com", "");
        assert_eq!(record.get("email"), "jane@x.com");
        assert_eq!(record.get("mobile"), "");
        assert_eq!(record.get("no_such_field"), "");
    }

    #[test]
    fn key_profile_parses_case_insensitively() {
        assert_eq!(KeyProfile::parse(" Contact "), Some(KeyProfile::Contact));
        assert_eq!(KeyProfile::parse("identity"), Some(KeyProfile::Identity));
        assert_eq!(KeyProfile::parse("badge"), None);
    }
}
