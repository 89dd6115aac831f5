//! Distinguished name value object.
//!
//! A distinguished name is the subject identity of a certificate request.
//! It is validated once at construction and never mutated afterwards: the
//! fields are private and there is no setter. Persisted names can only be
//! replaced together with the certificate that owns them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TrustlineError, TrustlineResult};

pub const MAX_STATE_OR_PROVINCE_LEN: usize = 128;
pub const MAX_LOCALITY_LEN: usize = 128;
pub const MAX_ORGANIZATION_LEN: usize = 64;
pub const MAX_ORGANIZATIONAL_UNIT_LEN: usize = 64;
pub const MAX_EMAIL_LEN: usize = 64;
pub const MAX_COMMON_NAME_LEN: usize = 64;

/// Identifies a single attribute of a [`DistinguishedName`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DnField {
    CountryCode,
    StateOrProvince,
    Locality,
    Organization,
    OrganizationalUnit,
    Email,
    CommonName,
}

impl DnField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DnField::CountryCode => "country",
            DnField::StateOrProvince => "state or province",
            DnField::Locality => "locality",
            DnField::Organization => "organization",
            DnField::OrganizationalUnit => "organizational unit",
            DnField::Email => "email address",
            DnField::CommonName => "common name",
        }
    }
}

impl fmt::Display for DnField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw, unvalidated distinguished name attributes as supplied by a caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DistinguishedNameFields {
    /// ISO 3166 alpha-2 country code (e.g. `NL`).
    pub country_code: String,
    pub state_or_province: String,
    pub locality: String,
    /// Legal name of the organization, unabbreviated.
    pub organization: String,
    pub organizational_unit: String,
    pub email: String,
    /// Fully qualified domain name for server certificates, a person or
    /// device name otherwise. Wildcards (`*.example.com`) are allowed.
    pub common_name: String,
}

/// A validated, immutable distinguished name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "DistinguishedNameFields", into = "DistinguishedNameFields")]
pub struct DistinguishedName {
    country_code: String,
    state_or_province: String,
    locality: String,
    organization: String,
    organizational_unit: String,
    email: String,
    common_name: String,
}

/// Characters allowed in free-text name attributes, besides ASCII
/// alphanumerics.
const NAME_PUNCTUATION: &[char] = &[
    '@', '#', '$', '%', '^', '&', '+', '=', '_', '.', '-', ',', ' ', '*',
];

fn check_text(field: DnField, value: &str, max_len: usize) -> TrustlineResult<()> {
    if value.is_empty() {
        return Err(invalid(field, "must not be empty".into()));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(invalid(
            field,
            format!("{len} characters exceeds the maximum of {max_len}"),
        ));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !NAME_PUNCTUATION.contains(c))
    {
        return Err(invalid(
            field,
            format!(
                "character `{bad}` is not allowed; only alphanumerics and \
                 [@#$%^&+=_,-.* ] are allowed"
            ),
        ));
    }
    Ok(())
}

fn check_country(value: &str) -> TrustlineResult<()> {
    if value.len() == 2 && value.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(invalid(
            DnField::CountryCode,
            format!("`{value}` is not a two-letter ISO 3166 country code"),
        ))
    }
}

fn check_email(value: &str) -> TrustlineResult<()> {
    check_text(DnField::Email, value, MAX_EMAIL_LEN)?;
    let well_formed = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !domain.contains(' ')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    };
    if well_formed {
        Ok(())
    } else {
        Err(invalid(
            DnField::Email,
            format!("`{value}` is not a valid email address"),
        ))
    }
}

fn invalid(field: DnField, reason: String) -> TrustlineError {
    TrustlineError::InvalidCharacters {
        field: field.as_str().into(),
        reason,
    }
}

impl DistinguishedName {
    /// Validate raw attributes and build a distinguished name.
    ///
    /// Fields are checked in declaration order; the first offending field
    /// is reported.
    pub fn new(fields: DistinguishedNameFields) -> TrustlineResult<Self> {
        check_country(&fields.country_code)?;
        check_text(
            DnField::StateOrProvince,
            &fields.state_or_province,
            MAX_STATE_OR_PROVINCE_LEN,
        )?;
        check_text(DnField::Locality, &fields.locality, MAX_LOCALITY_LEN)?;
        check_text(
            DnField::Organization,
            &fields.organization,
            MAX_ORGANIZATION_LEN,
        )?;
        check_text(
            DnField::OrganizationalUnit,
            &fields.organizational_unit,
            MAX_ORGANIZATIONAL_UNIT_LEN,
        )?;
        check_email(&fields.email)?;
        check_text(DnField::CommonName, &fields.common_name, MAX_COMMON_NAME_LEN)?;

        Ok(Self {
            country_code: fields.country_code,
            state_or_province: fields.state_or_province,
            locality: fields.locality,
            organization: fields.organization,
            organizational_unit: fields.organizational_unit,
            email: fields.email,
            common_name: fields.common_name,
        })
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn state_or_province(&self) -> &str {
        &self.state_or_province
    }

    pub fn locality(&self) -> &str {
        &self.locality
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn organizational_unit(&self) -> &str {
        &self.organizational_unit
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    /// Value of a single attribute.
    pub fn field(&self, field: DnField) -> &str {
        match field {
            DnField::CountryCode => &self.country_code,
            DnField::StateOrProvince => &self.state_or_province,
            DnField::Locality => &self.locality,
            DnField::Organization => &self.organization,
            DnField::OrganizationalUnit => &self.organizational_unit,
            DnField::Email => &self.email,
            DnField::CommonName => &self.common_name,
        }
    }

    /// RFC 2253 style rendering, e.g. `CN=ca.example.com, O=Example, ...`.
    pub fn to_rfc2253_string(&self) -> String {
        format!(
            "CN={}, O={}, OU={}, L={}, ST={}, EMAIL={}, C={}",
            self.common_name,
            self.organization,
            self.organizational_unit,
            self.locality,
            self.state_or_province,
            self.email,
            self.country_code,
        )
    }

    /// OpenSSL `-subj` rendering, e.g. `/CN=ca.example.com/O=Example/...`.
    pub fn to_openssl_subject(&self) -> String {
        format!(
            "/CN={}/O={}/OU={}/L={}/ST={}/emailAddress={}/C={}",
            self.common_name,
            self.organization,
            self.organizational_unit,
            self.locality,
            self.state_or_province,
            self.email,
            self.country_code,
        )
    }

    /// Common name reduced to `[a-z0-9-]`, suitable for file and key names.
    pub fn slug_common_name(&self) -> String {
        let mut slug = String::with_capacity(self.common_name.len());
        for c in self.common_name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }
        slug
    }
}

impl TryFrom<DistinguishedNameFields> for DistinguishedName {
    type Error = TrustlineError;

    fn try_from(fields: DistinguishedNameFields) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<DistinguishedName> for DistinguishedNameFields {
    fn from(dn: DistinguishedName) -> Self {
        Self {
            country_code: dn.country_code,
            state_or_province: dn.state_or_province,
            locality: dn.locality,
            organization: dn.organization,
            organizational_unit: dn.organizational_unit,
            email: dn.email,
            common_name: dn.common_name,
        }
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.common_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> DistinguishedNameFields {
        DistinguishedNameFields {
            country_code: "NL".into(),
            state_or_province: "Noord Holland".into(),
            locality: "Amstelveen".into(),
            organization: "Repleo".into(),
            organizational_unit: "IT Department".into(),
            email: "ca@repleo.nl".into(),
            common_name: "*.repleo.nl".into(),
        }
    }

    fn rejected_field(fields: DistinguishedNameFields) -> String {
        match DistinguishedName::new(fields) {
            Err(TrustlineError::InvalidCharacters { field, .. }) => field,
            other => panic!("expected InvalidCharacters, got {other:?}"),
        }
    }

    #[test]
    fn accepts_allowed_charset() {
        let dn = DistinguishedName::new(fields()).unwrap();
        assert_eq!(dn.common_name(), "*.repleo.nl");
        assert_eq!(dn.field(DnField::Organization), "Repleo");

        let mut f = fields();
        f.organizational_unit = "R&D #1, 50% + more=ok_-.".into();
        assert!(DistinguishedName::new(f).is_ok());
    }

    #[test]
    fn rejects_disallowed_characters() {
        for bad in ["Acme <Corp>", "Acme/Corp", "Acme;Corp", "Ümlaut", "a\"b"] {
            let mut f = fields();
            f.organization = bad.into();
            assert_eq!(rejected_field(f), "organization", "input {bad:?}");
        }
    }

    #[test]
    fn rejects_overlong_and_empty_fields() {
        let mut f = fields();
        f.common_name = "a".repeat(MAX_COMMON_NAME_LEN + 1);
        assert_eq!(rejected_field(f), "common name");

        let mut f = fields();
        f.locality = "a".repeat(MAX_LOCALITY_LEN);
        assert!(DistinguishedName::new(f).is_ok());

        let mut f = fields();
        f.locality = String::new();
        assert_eq!(rejected_field(f), "locality");
    }

    #[test]
    fn country_must_be_two_uppercase_letters() {
        for bad in ["nl", "NLD", "N1", ""] {
            let mut f = fields();
            f.country_code = bad.into();
            assert_eq!(rejected_field(f), "country", "input {bad:?}");
        }
    }

    #[test]
    fn email_must_be_well_formed() {
        for bad in ["ca.repleo.nl", "@repleo.nl", "ca@repleo", "ca@@repleo.nl"] {
            let mut f = fields();
            f.email = bad.into();
            assert_eq!(rejected_field(f), "email address", "input {bad:?}");
        }
    }

    #[test]
    fn renders_rfc2253_and_openssl_subject() {
        let dn = DistinguishedName::new(fields()).unwrap();
        assert_eq!(
            dn.to_rfc2253_string(),
            "CN=*.repleo.nl, O=Repleo, OU=IT Department, L=Amstelveen, \
             ST=Noord Holland, EMAIL=ca@repleo.nl, C=NL"
        );
        assert_eq!(
            dn.to_openssl_subject(),
            "/CN=*.repleo.nl/O=Repleo/OU=IT Department/L=Amstelveen\
             /ST=Noord Holland/emailAddress=ca@repleo.nl/C=NL"
        );
    }

    #[test]
    fn slug_collapses_punctuation() {
        let dn = DistinguishedName::new(fields()).unwrap();
        assert_eq!(dn.slug_common_name(), "repleo-nl");
    }

    #[test]
    fn deserialization_revalidates() {
        let mut raw = fields();
        raw.country_code = "Netherlands".into();
        let json = serde_json::to_string(&raw).unwrap();
        assert!(serde_json::from_str::<DistinguishedName>(&json).is_err());
    }
}
