use std::fmt;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, SetOfVec};
use der::{Tag, Tagged};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{MtlsKitError, Result};

/// id-at-countryName
pub const COUNTRY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
/// id-at-organizationName
pub const ORGANIZATION_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
/// id-at-organizationalUnitName
pub const ORGANIZATIONAL_UNIT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
/// id-at-commonName
pub const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Distinguished name of a certificate subject or issuer.
///
/// Attributes are encoded in the order C, O, OU, CN, one attribute per RDN.
/// Absent optional attributes are omitted rather than encoded empty.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The two-letter country code (C).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// Checks every attribute before it is committed to a certificate.
    pub fn validate(&self) -> Result<()> {
        check_attribute("CN", &self.common_name)?;
        if let Some(country) = &self.country {
            if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_alphabetic()) {
                return Err(MtlsKitError::InvalidDistinguishedName(format!(
                    "country must be a two-letter code, got {country:?}"
                )));
            }
        }
        if let Some(organization) = &self.organization {
            check_attribute("O", organization)?;
        }
        if let Some(unit) = &self.organization_unit {
            check_attribute("OU", unit)?;
        }
        Ok(())
    }

    fn attributes(&self) -> Vec<(ObjectIdentifier, Tag, &str)> {
        let mut attributes = Vec::with_capacity(4);
        if let Some(country) = &self.country {
            attributes.push((COUNTRY_NAME, Tag::PrintableString, country.as_str()));
        }
        if let Some(organization) = &self.organization {
            attributes.push((ORGANIZATION_NAME, Tag::Utf8String, organization.as_str()));
        }
        if let Some(unit) = &self.organization_unit {
            attributes.push((ORGANIZATIONAL_UNIT_NAME, Tag::Utf8String, unit.as_str()));
        }
        attributes.push((COMMON_NAME, Tag::Utf8String, self.common_name.as_str()));
        attributes
    }

    /// Converts the distinguished name to an X.509-compatible format.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        self.validate()?;
        let rdns = self
            .attributes()
            .into_iter()
            .map(|(oid, tag, value)| -> Result<RelativeDistinguishedName> {
                let atv = AttributeTypeAndValue {
                    oid,
                    value: Any::new(tag, value.as_bytes())?,
                };
                Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes other than C, O, OU and CN are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self> {
        let mut dn = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = match attr.value.tag() {
                    Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {
                        std::str::from_utf8(attr.value.value())
                            .map_err(|e| MtlsKitError::DecodingError(e.to_string()))?
                            .to_string()
                    }
                    other => {
                        return Err(MtlsKitError::DecodingError(format!(
                            "unsupported string type {other} for attribute {}",
                            attr.oid
                        )));
                    }
                };
                match attr.oid {
                    COMMON_NAME => dn.common_name = value,
                    COUNTRY_NAME => dn.country = Some(value),
                    ORGANIZATION_NAME => dn.organization = Some(value),
                    ORGANIZATIONAL_UNIT_NAME => dn.organization_unit = Some(value),
                    _ => {}
                }
            }
        }
        Ok(dn)
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .attributes()
            .into_iter()
            .map(|(oid, _, value)| {
                let key = match oid {
                    COUNTRY_NAME => "C",
                    ORGANIZATION_NAME => "O",
                    ORGANIZATIONAL_UNIT_NAME => "OU",
                    _ => "CN",
                };
                format!("{key}={value}")
            })
            .collect();
        f.write_str(&parts.join(", "))
    }
}

fn check_attribute(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MtlsKitError::InvalidDistinguishedName(format!(
            "{name} must not be empty"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(MtlsKitError::InvalidDistinguishedName(format!(
            "{name} contains control characters"
        )));
    }
    Ok(())
}

const SECONDS_PER_DAY: i64 = 86_400;

/// Last year a GeneralizedTime can express.
pub const MAX_X509_YEAR: i32 = 9999;

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
/// Both bounds are truncated to whole seconds, which is all DER time can carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    ///
    /// Zero or negative lengths are rejected with `InvalidInput`.
    pub fn for_days(days: i64) -> Result<Self> {
        if days <= 0 {
            return Err(MtlsKitError::InvalidInput(format!(
                "validity must be at least one day, got {days}"
            )));
        }
        let now = OffsetDateTime::now_utc();
        let not_before = OffsetDateTime::from_unix_timestamp(now.unix_timestamp())
            .map_err(|e| MtlsKitError::InvalidInput(e.to_string()))?;
        let not_after = days
            .checked_mul(SECONDS_PER_DAY)
            .map(Duration::seconds)
            .and_then(|length| not_before.checked_add(length))
            .filter(|end| end.year() <= MAX_X509_YEAR)
            .ok_or_else(|| {
                MtlsKitError::InvalidInput(format!(
                    "validity of {days} days ends after year {MAX_X509_YEAR}"
                ))
            })?;
        Ok(Self {
            not_before,
            not_after,
        })
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_dn() -> DistinguishedName {
        DistinguishedName::builder()
            .common_name("client1".to_string())
            .organization("Example Corp".to_string())
            .organization_unit("TrustedDevices".to_string())
            .country("US".to_string())
            .build()
    }

    #[test]
    fn test_x509_name_preserves_attributes() {
        let dn = client_dn();
        let decoded = DistinguishedName::from_x509_name(&dn.as_x509_name().unwrap()).unwrap();
        assert_eq!(dn, decoded);
    }

    #[test]
    fn test_display_orders_attributes() {
        assert_eq!(
            client_dn().to_string(),
            "C=US, O=Example Corp, OU=TrustedDevices, CN=client1"
        );
    }

    #[test]
    fn test_empty_common_name_is_rejected() {
        let dn = DistinguishedName::builder().common_name("  ".to_string()).build();
        assert!(matches!(
            dn.validate(),
            Err(MtlsKitError::InvalidDistinguishedName(_))
        ));
    }

    #[test]
    fn test_bad_country_is_rejected() {
        let dn = DistinguishedName::builder()
            .common_name("ca".to_string())
            .country("USA".to_string())
            .build();
        assert!(matches!(
            dn.as_x509_name(),
            Err(MtlsKitError::InvalidDistinguishedName(_))
        ));
    }

    #[test]
    fn test_zero_day_validity_is_rejected() {
        assert!(matches!(
            Validity::for_days(0),
            Err(MtlsKitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validity_past_year_9999_is_rejected() {
        for days in [3_000_000, i64::MAX] {
            assert!(matches!(
                Validity::for_days(days),
                Err(MtlsKitError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_validity_is_whole_seconds() {
        let validity = Validity::for_days(1).unwrap();
        assert_eq!(validity.not_before.nanosecond(), 0);
        assert_eq!(validity.not_after - validity.not_before, Duration::days(1));
    }
}
