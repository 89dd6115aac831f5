//! Hierarchy rules for issuing a certificate under a parent.
//!
//! [`validate`] is a pure function of the candidate and its resolved
//! parent. Rules run in a fixed order and the first failing rule decides
//! the rejection:
//!
//! 1. a root has no parent;
//! 2. every other type has one;
//! 3. server and client certificates are issued by an intermediate;
//! 4. an intermediate directly under a root shares the root's country,
//!    state/province and organization (policy strict);
//! 5. a child is not valid for more days than its parent;
//! 6. the parent is active (not revoked, key material present).
//!
//! Rule 4 only applies when the immediate parent is a root, so chains of
//! intermediates are accepted at any depth.

use trustline_core::error::HierarchyViolation;
use trustline_core::models::certificate::{Certificate, CertificateStatus, CertificateType};
use trustline_core::models::distinguished_name::{DistinguishedName, DnField};

/// DN attributes an intermediate must share with its root.
pub const STRICT_POLICY_FIELDS: [DnField; 3] = [
    DnField::CountryCode,
    DnField::StateOrProvince,
    DnField::Organization,
];

/// The parts of a not-yet-persisted certificate the rules look at.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub cert_type: CertificateType,
    pub dn: &'a DistinguishedName,
    pub days_valid: i64,
}

pub fn validate(
    candidate: &Candidate<'_>,
    parent: Option<&Certificate>,
) -> Result<(), HierarchyViolation> {
    let parent = match (candidate.cert_type, parent) {
        (CertificateType::Root, Some(_)) => {
            return Err(HierarchyViolation::RootMustNotHaveParent);
        }
        (CertificateType::Root, None) => return Ok(()),
        (cert_type, None) => {
            return Err(HierarchyViolation::NonRootRequiresParent { cert_type });
        }
        (_, Some(parent)) => parent,
    };

    if candidate.cert_type.requires_intermediate_parent()
        && parent.cert_type != CertificateType::Intermediate
    {
        return Err(HierarchyViolation::InvalidParentType {
            cert_type: candidate.cert_type,
            parent_type: parent.cert_type,
        });
    }

    if candidate.cert_type == CertificateType::Intermediate
        && parent.cert_type == CertificateType::Root
    {
        check_strict_policy(candidate.dn, &parent.dn)?;
    }

    let parent_days_valid = parent.days_valid();
    if candidate.days_valid > parent_days_valid {
        return Err(HierarchyViolation::ExpiryExceedsParent {
            days_valid: candidate.days_valid,
            parent_days_valid,
        });
    }

    match parent.status {
        CertificateStatus::Active if parent.revoked_at.is_none() => Ok(()),
        CertificateStatus::PendingGeneration => {
            Err(HierarchyViolation::ParentNotReady { parent_id: parent.id })
        }
        _ => Err(HierarchyViolation::ParentRevoked { parent_id: parent.id }),
    }
}

fn check_strict_policy(
    dn: &DistinguishedName,
    root_dn: &DistinguishedName,
) -> Result<(), HierarchyViolation> {
    for field in STRICT_POLICY_FIELDS {
        let expected = root_dn.field(field);
        let actual = dn.field(field);
        if expected != actual {
            return Err(HierarchyViolation::PolicyMismatch {
                field,
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use trustline_core::models::distinguished_name::DistinguishedNameFields;
    use uuid::Uuid;

    use super::*;

    fn dn_with(country: &str, state: &str, org: &str, cn: &str) -> DistinguishedName {
        DistinguishedName::new(DistinguishedNameFields {
            country_code: country.into(),
            state_or_province: state.into(),
            locality: "Amstelveen".into(),
            organization: org.into(),
            organizational_unit: "IT".into(),
            email: "ca@repleo.nl".into(),
            common_name: cn.into(),
        })
        .unwrap()
    }

    fn dn() -> DistinguishedName {
        dn_with("NL", "Noord Holland", "Repleo", "node")
    }

    fn cert(cert_type: CertificateType, days_valid: i64) -> Certificate {
        let created_at = Utc::now();
        Certificate {
            id: Uuid::new_v4(),
            cert_type,
            short_name: "parent".into(),
            name: "parent - node".into(),
            dn_id: Uuid::new_v4(),
            dn: dn(),
            parent_id: None,
            crl_distribution_url: None,
            ocsp_distribution_host: None,
            status: CertificateStatus::Active,
            created_at,
            expires_at: (created_at + Duration::days(days_valid)).date_naive(),
            revoked_at: None,
        }
    }

    fn candidate(cert_type: CertificateType, dn: &DistinguishedName, days: i64) -> Candidate<'_> {
        Candidate {
            cert_type,
            dn,
            days_valid: days,
        }
    }

    #[test]
    fn root_without_parent_is_accepted() {
        let dn = dn();
        assert_eq!(
            validate(&candidate(CertificateType::Root, &dn, 7300), None),
            Ok(())
        );
    }

    #[test]
    fn root_with_parent_is_rejected() {
        let dn = dn();
        let parent = cert(CertificateType::Root, 7300);
        assert_eq!(
            validate(&candidate(CertificateType::Root, &dn, 10), Some(&parent)),
            Err(HierarchyViolation::RootMustNotHaveParent)
        );
    }

    #[test]
    fn every_non_root_type_requires_a_parent() {
        let dn = dn();
        for t in CertificateType::ALL
            .into_iter()
            .filter(|t| *t != CertificateType::Root)
        {
            assert_eq!(
                validate(&candidate(t, &dn, 10), None),
                Err(HierarchyViolation::NonRootRequiresParent { cert_type: t })
            );
        }
    }

    #[test]
    fn end_entities_need_an_intermediate_parent() {
        let dn = dn();
        for t in [CertificateType::Server, CertificateType::Client] {
            for parent_type in [
                CertificateType::Root,
                CertificateType::Server,
                CertificateType::Client,
                CertificateType::Ocsp,
            ] {
                let parent = cert(parent_type, 3650);
                assert_eq!(
                    validate(&candidate(t, &dn, 365), Some(&parent)),
                    Err(HierarchyViolation::InvalidParentType {
                        cert_type: t,
                        parent_type,
                    })
                );
            }
            let parent = cert(CertificateType::Intermediate, 3650);
            assert_eq!(validate(&candidate(t, &dn, 365), Some(&parent)), Ok(()));
        }
    }

    #[test]
    fn intermediate_under_intermediate_is_not_a_parent_type_error() {
        let dn = dn_with("US", "Texas", "Other", "sub");
        let parent = cert(CertificateType::Intermediate, 3650);
        assert_eq!(
            validate(
                &candidate(CertificateType::Intermediate, &dn, 1000),
                Some(&parent)
            ),
            Ok(())
        );
    }

    #[test]
    fn strict_policy_reports_first_mismatching_field() {
        let root = cert(CertificateType::Root, 7300);
        let cases = [
            (dn_with("US", "Noord Holland", "Repleo", "i"), DnField::CountryCode),
            (dn_with("NL", "Utrecht", "Repleo", "i"), DnField::StateOrProvince),
            (dn_with("NL", "Noord Holland", "Other", "i"), DnField::Organization),
            (dn_with("US", "Utrecht", "Other", "i"), DnField::CountryCode),
        ];
        for (dn, field) in cases {
            match validate(&candidate(CertificateType::Intermediate, &dn, 3650), Some(&root)) {
                Err(HierarchyViolation::PolicyMismatch { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected PolicyMismatch({field}), got {other:?}"),
            }
        }
    }

    #[test]
    fn strict_policy_ignores_other_fields() {
        let root = cert(CertificateType::Root, 7300);
        let dn = dn_with("NL", "Noord Holland", "Repleo", "Completely different CN");
        assert_eq!(
            validate(&candidate(CertificateType::Intermediate, &dn, 3650), Some(&root)),
            Ok(())
        );
    }

    #[test]
    fn validity_boundary_is_inclusive() {
        let dn = dn();
        let parent = cert(CertificateType::Intermediate, 3650);
        assert_eq!(
            validate(&candidate(CertificateType::Server, &dn, 3650), Some(&parent)),
            Ok(())
        );
        assert_eq!(
            validate(&candidate(CertificateType::Server, &dn, 3651), Some(&parent)),
            Err(HierarchyViolation::ExpiryExceedsParent {
                days_valid: 3651,
                parent_days_valid: 3650,
            })
        );
    }

    #[test]
    fn policy_is_checked_before_validity() {
        let root = cert(CertificateType::Root, 100);
        let dn = dn_with("US", "Noord Holland", "Repleo", "i");
        assert!(matches!(
            validate(&candidate(CertificateType::Intermediate, &dn, 5000), Some(&root)),
            Err(HierarchyViolation::PolicyMismatch { .. })
        ));
    }

    #[test]
    fn parent_must_be_active() {
        let dn = dn();
        let mut parent = cert(CertificateType::Intermediate, 3650);
        parent.status = CertificateStatus::PendingGeneration;
        assert_eq!(
            validate(&candidate(CertificateType::Client, &dn, 365), Some(&parent)),
            Err(HierarchyViolation::ParentNotReady { parent_id: parent.id })
        );

        parent.status = CertificateStatus::Revoked;
        parent.revoked_at = Some(Utc::now());
        assert_eq!(
            validate(&candidate(CertificateType::Client, &dn, 365), Some(&parent)),
            Err(HierarchyViolation::ParentRevoked { parent_id: parent.id })
        );
    }
}
