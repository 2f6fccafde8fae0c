//! Individual (ISER) and convocatoria-wide document exemptions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::context::Collaborators;
use super::domain::{ConvocatoriaId, ExemptionId, Timestamp, UserId};
use super::repository::{capabilities, AuditEntry, ExemptionRepository, RepositoryError};
use crate::config::ExemptionTieBreak;

/// Document codes referenced by the fixed exemption table.
pub mod codes {
    pub const BACKGROUND_PROCURADURIA: &str = "antecedentes_procuraduria";
    pub const BACKGROUND_CONTRALORIA: &str = "antecedentes_contraloria";
    pub const BACKGROUND_POLICE: &str = "antecedentes_policia";
    pub const RNMC: &str = "rnmc";
    pub const MEDICAL_CERTIFICATE: &str = "certificado_medico";
}

const HISTORIC_ISER_DOCS: &[&str] = &[
    codes::BACKGROUND_PROCURADURIA,
    codes::BACKGROUND_CONTRALORIA,
    codes::BACKGROUND_POLICE,
    codes::RNMC,
    codes::MEDICAL_CERTIFICATE,
];
const INTERNAL_TRANSFER_DOCS: &[&str] =
    &[codes::BACKGROUND_PROCURADURIA, codes::BACKGROUND_CONTRALORIA];
const REHIRE_DOCS: &[&str] = &[
    codes::BACKGROUND_PROCURADURIA,
    codes::BACKGROUND_CONTRALORIA,
    codes::BACKGROUND_POLICE,
    codes::RNMC,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionType {
    HistoricoIser,
    DocumentosRecientes,
    TrasladoInterno,
    Recontratacion,
}

impl ExemptionType {
    pub const fn code(self) -> &'static str {
        match self {
            ExemptionType::HistoricoIser => "historico_iser",
            ExemptionType::DocumentosRecientes => "documentos_recientes",
            ExemptionType::TrasladoInterno => "traslado_interno",
            ExemptionType::Recontratacion => "recontratacion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "historico_iser" | "historic_iser" => Some(ExemptionType::HistoricoIser),
            "documentos_recientes" | "recent_documents" => Some(ExemptionType::DocumentosRecientes),
            "traslado_interno" | "internal_transfer" => Some(ExemptionType::TrasladoInterno),
            "recontratacion" | "rehire" | "rehire_same_year" => {
                Some(ExemptionType::Recontratacion)
            }
            _ => None,
        }
    }

    /// Documents still demanded from an applicant holding this exemption.
    pub const fn required_documents(self) -> RequiredDocuments {
        match self {
            ExemptionType::HistoricoIser => RequiredDocuments::Only(HISTORIC_ISER_DOCS),
            ExemptionType::DocumentosRecientes => RequiredDocuments::FreshnessDependent,
            ExemptionType::TrasladoInterno => RequiredDocuments::Only(INTERNAL_TRANSFER_DOCS),
            ExemptionType::Recontratacion => RequiredDocuments::Only(REHIRE_DOCS),
        }
    }
}

impl fmt::Display for ExemptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of the fixed exemption lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredDocuments {
    /// Keep only these codes.
    Only(&'static [&'static str]),
    /// Depends on which of the applicant's documents are still within their validity window.
    FreshnessDependent,
}

impl RequiredDocuments {
    pub fn codes(self) -> BTreeSet<&'static str> {
        match self {
            RequiredDocuments::Only(codes) => codes.iter().copied().collect(),
            RequiredDocuments::FreshnessDependent => BTreeSet::new(),
        }
    }
}

/// Individual exemption; inactive forever once revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemption {
    pub id: ExemptionId,
    pub user_id: UserId,
    pub exemption_type: ExemptionType,
    pub document_ref: Option<String>,
    pub notes: Option<String>,
    pub valid_from: Timestamp,
    pub valid_until: Option<Timestamp>,
    pub created_by: UserId,
    pub time_created: Timestamp,
    pub time_revoked: Option<Timestamp>,
    pub revoked_by: Option<UserId>,
    pub revoke_reason: Option<String>,
}

impl Exemption {
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.time_revoked.is_none()
            && self.valid_from <= now
            && self.valid_until.map_or(true, |until| now <= until)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExemption {
    pub user_id: UserId,
    pub exemption_type: ExemptionType,
    pub document_ref: Option<String>,
    pub notes: Option<String>,
    pub valid_from: Timestamp,
    pub valid_until: Option<Timestamp>,
    pub created_by: UserId,
    pub time_created: Timestamp,
}

/// Input for granting an exemption; the resolver stamps creator and creation time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExemptionGrant {
    pub user_id: UserId,
    pub exemption_type: ExemptionType,
    #[serde(default)]
    pub document_ref: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub valid_from: Timestamp,
    #[serde(default)]
    pub valid_until: Option<Timestamp>,
}

/// A document skipped by every applicant of a convocatoria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvocatoriaExemption {
    pub convocatoria_id: ConvocatoriaId,
    pub document_code: String,
    pub created_by: UserId,
    pub time_created: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum ExemptionError {
    #[error("user {user} lacks capability {capability}")]
    PermissionDenied {
        user: UserId,
        capability: &'static str,
    },
    #[error("exemption validity ends before it starts")]
    InvalidWindow,
    #[error("exemption {0} not found")]
    NotFound(ExemptionId),
    #[error("exemption {0} is already revoked")]
    AlreadyRevoked(ExemptionId),
    #[error("document {document_code} is already exempted for convocatoria {convocatoria}")]
    DuplicateConvocatoriaExemption {
        convocatoria: ConvocatoriaId,
        document_code: String,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Resolves which exemptions apply to a user or a convocatoria.
pub struct ExemptionResolver<S: ?Sized> {
    store: Arc<S>,
    collaborators: Collaborators,
    tie_break: ExemptionTieBreak,
}

impl<S: ?Sized> Clone for ExemptionResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collaborators: self.collaborators.clone(),
            tie_break: self.tie_break,
        }
    }
}

impl<S> ExemptionResolver<S>
where
    S: ExemptionRepository + ?Sized,
{
    pub fn new(store: Arc<S>, collaborators: Collaborators, tie_break: ExemptionTieBreak) -> Self {
        Self {
            store,
            collaborators,
            tie_break,
        }
    }

    /// The single exemption that governs `user` right now, if any.
    pub fn active_exemption(&self, user: UserId) -> Result<Option<Exemption>, ExemptionError> {
        let now = self.collaborators.now();
        let exemptions = self.store.exemptions_for_user(user)?;
        let active = select_active(exemptions, now, self.tie_break);
        if let Some(exemption) = &active {
            debug!(
                %user,
                exemption = %exemption.id,
                kind = %exemption.exemption_type,
                "active exemption resolved"
            );
        }
        Ok(active)
    }

    pub fn convocatoria_exempted_codes(
        &self,
        convocatoria: ConvocatoriaId,
    ) -> Result<BTreeSet<String>, ExemptionError> {
        Ok(self
            .store
            .convocatoria_exemptions(convocatoria)?
            .into_iter()
            .map(|exemption| exemption.document_code)
            .collect())
    }

    pub fn grant(&self, grant: ExemptionGrant, actor: UserId) -> Result<Exemption, ExemptionError> {
        self.require(actor)?;
        if grant
            .valid_until
            .is_some_and(|until| until < grant.valid_from)
        {
            return Err(ExemptionError::InvalidWindow);
        }

        let exemption = self.store.insert_exemption(NewExemption {
            user_id: grant.user_id,
            exemption_type: grant.exemption_type,
            document_ref: grant.document_ref,
            notes: grant.notes,
            valid_from: grant.valid_from,
            valid_until: grant.valid_until,
            created_by: actor,
            time_created: self.collaborators.now(),
        })?;

        info!(
            exemption = %exemption.id,
            user = %exemption.user_id,
            kind = %exemption.exemption_type,
            "exemption granted"
        );
        self.collaborators.audit(AuditEntry {
            action: "exemption_granted",
            entity_type: "exemption",
            entity_id: exemption.id.0,
            actor: Some(actor),
            extra: Some(serde_json::json!({ "type": exemption.exemption_type.code() })),
        });
        Ok(exemption)
    }

    pub fn revoke(
        &self,
        id: ExemptionId,
        actor: UserId,
        reason: &str,
    ) -> Result<Exemption, ExemptionError> {
        self.require(actor)?;
        let mut exemption = self
            .store
            .exemption(id)?
            .ok_or(ExemptionError::NotFound(id))?;
        if exemption.time_revoked.is_some() {
            return Err(ExemptionError::AlreadyRevoked(id));
        }

        exemption.time_revoked = Some(self.collaborators.now());
        exemption.revoked_by = Some(actor);
        exemption.revoke_reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());
        self.store.update_exemption(exemption.clone())?;

        info!(exemption = %id, "exemption revoked");
        self.collaborators.audit(AuditEntry {
            action: "exemption_revoked",
            entity_type: "exemption",
            entity_id: id.0,
            actor: Some(actor),
            extra: exemption
                .revoke_reason
                .as_ref()
                .map(|reason| serde_json::json!({ "reason": reason })),
        });
        Ok(exemption)
    }

    pub fn add_convocatoria_exemption(
        &self,
        convocatoria: ConvocatoriaId,
        document_code: &str,
        actor: UserId,
    ) -> Result<(), ExemptionError> {
        self.require(actor)?;
        let exemption = ConvocatoriaExemption {
            convocatoria_id: convocatoria,
            document_code: document_code.to_string(),
            created_by: actor,
            time_created: self.collaborators.now(),
        };
        match self.store.insert_convocatoria_exemption(exemption) {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => {
                return Err(ExemptionError::DuplicateConvocatoriaExemption {
                    convocatoria,
                    document_code: document_code.to_string(),
                })
            }
            Err(other) => return Err(other.into()),
        }

        self.collaborators.audit(AuditEntry {
            action: "convocatoria_exemption_added",
            entity_type: "convocatoria",
            entity_id: convocatoria.0,
            actor: Some(actor),
            extra: Some(serde_json::json!({ "document": document_code })),
        });
        Ok(())
    }

    pub fn remove_convocatoria_exemption(
        &self,
        convocatoria: ConvocatoriaId,
        document_code: &str,
        actor: UserId,
    ) -> Result<bool, ExemptionError> {
        self.require(actor)?;
        let removed = self
            .store
            .delete_convocatoria_exemption(convocatoria, document_code)?;
        if removed {
            self.collaborators.audit(AuditEntry {
                action: "convocatoria_exemption_removed",
                entity_type: "convocatoria",
                entity_id: convocatoria.0,
                actor: Some(actor),
                extra: Some(serde_json::json!({ "document": document_code })),
            });
        }
        Ok(removed)
    }

    pub(crate) fn require(&self, actor: UserId) -> Result<(), ExemptionError> {
        if self
            .collaborators
            .has_capability(actor, capabilities::MANAGE_EXEMPTIONS)
        {
            Ok(())
        } else {
            Err(ExemptionError::PermissionDenied {
                user: actor,
                capability: capabilities::MANAGE_EXEMPTIONS,
            })
        }
    }
}

/// Among exemptions active at `now`, pick the one the tie-break favours.
/// Equal keys fall back to the higher id, i.e. the last inserted row.
pub(crate) fn select_active(
    exemptions: Vec<Exemption>,
    now: Timestamp,
    tie_break: ExemptionTieBreak,
) -> Option<Exemption> {
    exemptions
        .into_iter()
        .filter(|exemption| exemption.is_active_at(now))
        .max_by_key(|exemption| {
            let primary = match tie_break {
                ExemptionTieBreak::LatestCreated => exemption.time_created,
                ExemptionTieBreak::LatestValidFrom => exemption.valid_from,
            };
            (primary, exemption.time_created, exemption.id)
        })
}
