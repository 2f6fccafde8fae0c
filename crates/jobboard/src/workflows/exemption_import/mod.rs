//! Bulk import of individual exemptions from a header-driven CSV export.
//!
//! Bad rows are reported in the [`ImportReport`] and never abort the batch.

mod parser;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::workflows::recruitment::context::Collaborators;
use crate::workflows::recruitment::domain::{ExemptionId, UserId};
use crate::workflows::recruitment::exemptions::{
    ExemptionError, ExemptionGrant, ExemptionResolver, ExemptionType,
};
use crate::workflows::recruitment::repository::{
    ApplicantDirectory, ExemptionRepository, RepositoryError, UserLookup,
};

use parser::{
    parse_end, parse_rows, parse_start, ExemptionRow, IDENTIFIER_COLUMNS, REQUIRED_COLUMNS,
};

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumn(String),
    Exemption(ExemptionError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read exemption file: {}", err),
            ImportError::Csv(err) => write!(f, "invalid exemption CSV data: {}", err),
            ImportError::MissingColumn(column) => {
                write!(f, "exemption CSV is missing the {} column", column)
            }
            ImportError::Exemption(err) => write!(f, "could not import exemptions: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::MissingColumn(_) => None,
            ImportError::Exemption(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<ExemptionError> for ImportError {
    fn from(err: ExemptionError) -> Self {
        Self::Exemption(err)
    }
}

impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        Self::Exemption(ExemptionError::Repository(err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedExemption {
    pub line: u64,
    pub user_id: UserId,
    pub exemption_id: ExemptionId,
    pub exemption_type: ExemptionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportIssue {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<ImportedExemption>,
    pub issues: Vec<ImportIssue>,
}

impl ImportReport {
    pub fn rows(&self) -> usize {
        self.imported.len() + self.issues.len()
    }

    fn issue(&mut self, line: u64, message: impl Into<String>) {
        self.issues.push(ImportIssue {
            line,
            message: message.into(),
        });
    }
}

pub struct ExemptionImporter<S: ?Sized> {
    store: Arc<S>,
    resolver: ExemptionResolver<S>,
}

impl<S> ExemptionImporter<S>
where
    S: ExemptionRepository + ApplicantDirectory + ?Sized,
{
    pub fn new(store: Arc<S>, collaborators: Collaborators, config: &EngineConfig) -> Self {
        let resolver =
            ExemptionResolver::new(store.clone(), collaborators, config.exemption_tie_break);
        Self { store, resolver }
    }

    pub fn from_path<P: AsRef<Path>>(
        &self,
        path: P,
        actor: UserId,
    ) -> Result<ImportReport, ImportError> {
        let file = std::fs::File::open(path)?;
        self.from_reader(file, actor)
    }

    pub fn from_reader<R: Read>(
        &self,
        reader: R,
        actor: UserId,
    ) -> Result<ImportReport, ImportError> {
        self.resolver.require(actor)?;
        let (headers, rows) = parse_rows(reader)?;
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|header| header == column) {
                return Err(ImportError::MissingColumn(column.to_string()));
            }
        }
        if !IDENTIFIER_COLUMNS
            .iter()
            .any(|column| headers.iter().any(|header| header == column))
        {
            return Err(ImportError::MissingColumn(IDENTIFIER_COLUMNS.join("|")));
        }

        let mut report = ImportReport::default();
        for parsed in rows {
            let row = match parsed.row {
                Ok(row) => row,
                Err(message) => {
                    report.issue(parsed.line, message);
                    continue;
                }
            };
            match grant_from_row(self.store.as_ref(), &row) {
                Ok(grant) => {
                    let exemption_type = grant.exemption_type;
                    let user_id = grant.user_id;
                    match self.resolver.grant(grant, actor) {
                        Ok(exemption) => report.imported.push(ImportedExemption {
                            line: parsed.line,
                            user_id,
                            exemption_id: exemption.id,
                            exemption_type,
                        }),
                        Err(err @ ExemptionError::PermissionDenied { .. }) => {
                            return Err(err.into())
                        }
                        Err(err) => report.issue(parsed.line, err.to_string()),
                    }
                }
                Err(message) => report.issue(parsed.line, message),
            }
        }

        info!(
            imported = report.imported.len(),
            issues = report.issues.len(),
            "exemption import finished"
        );
        if !report.issues.is_empty() {
            warn!(issues = report.issues.len(), "exemption import skipped rows");
        }
        Ok(report)
    }
}

/// Validate one row into a grant; `Err` carries the message reported for the line.
fn grant_from_row<S>(store: &S, row: &ExemptionRow) -> Result<ExemptionGrant, String>
where
    S: ApplicantDirectory + ?Sized,
{
    let lookup = row
        .lookup()
        .ok_or_else(|| "no email, username or idnumber given".to_string())?;
    let user_id = store
        .find_user(&lookup)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("user not found: {}", describe(&lookup)))?;

    let raw_type = row
        .exemptiontype
        .as_deref()
        .ok_or_else(|| "exemptiontype is empty".to_string())?;
    let exemption_type = ExemptionType::parse(raw_type)
        .ok_or_else(|| format!("unknown exemption type {raw_type}"))?;

    let raw_from = row
        .validfrom
        .as_deref()
        .ok_or_else(|| "validfrom is empty".to_string())?;
    let valid_from =
        parse_start(raw_from).ok_or_else(|| format!("invalid validfrom date {raw_from}"))?;
    let valid_until = match row.validuntil.as_deref() {
        Some(raw) => {
            Some(parse_end(raw).ok_or_else(|| format!("invalid validuntil date {raw}"))?)
        }
        None => None,
    };

    Ok(ExemptionGrant {
        user_id,
        exemption_type,
        document_ref: row.documentref.clone(),
        notes: row.notes.clone(),
        valid_from,
        valid_until,
    })
}

fn describe(lookup: &UserLookup) -> String {
    match lookup {
        UserLookup::Email(email) => format!("email {email}"),
        UserLookup::Username(username) => format!("username {username}"),
        UserLookup::IdNumber(number) => format!("idnumber {number}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::workflows::recruitment::domain::ApplicantProfile;
    use crate::workflows::recruitment::memory::{
        InMemoryRecruitmentStore, ManualClock, RecordingAudit, RecordingEvents,
        RecordingNotifications, StaticCapabilities,
    };
    use crate::workflows::recruitment::repository::capabilities;

    const IMPORTER: UserId = UserId(900);
    const ANA: UserId = UserId(1);
    const LUIS: UserId = UserId(2);

    fn profile(user_id: UserId, email: &str, username: &str, id_number: &str) -> ApplicantProfile {
        ApplicantProfile {
            user_id,
            email: email.to_string(),
            username: username.to_string(),
            id_number: Some(id_number.to_string()),
            gender: None,
            education_level: None,
            birth_date: NaiveDate::from_ymd_opt(1988, 2, 1),
        }
    }

    fn importer() -> (Arc<InMemoryRecruitmentStore>, ExemptionImporter<InMemoryRecruitmentStore>) {
        let store = Arc::new(InMemoryRecruitmentStore::new());
        store.seed_profile(profile(ANA, "ana@iser.edu.co", "ana.rojas", "1098111"));
        store.seed_profile(profile(LUIS, "luis@iser.edu.co", "luis.pena", "1098222"));

        let grants = StaticCapabilities::default();
        grants.grant(IMPORTER, capabilities::MANAGE_EXEMPTIONS);
        let collaborators = Collaborators::new(
            Arc::new(RecordingNotifications::default()),
            Arc::new(RecordingAudit::default()),
            Arc::new(RecordingEvents::default()),
            Arc::new(grants),
            Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap(),
            )),
        );
        let importer = ExemptionImporter::new(store.clone(), collaborators, &EngineConfig::default());
        (store, importer)
    }

    #[test]
    fn rows_resolve_users_by_any_identifier() {
        let (store, importer) = importer();
        let csv = "\
email,username,idnumber,exemptiontype,documentref,notes,validfrom,validuntil
ana@iser.edu.co,,,historico_iser,RES-001,,2025-01-01,
,luis.pena,,rehire,,Second term,2025-01-15,2025-12-31
,,1098111,traslado_interno,,,2025-02-01,
";
        let report = importer.from_reader(csv.as_bytes(), IMPORTER).unwrap();

        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert_eq!(report.rows(), 3);
        let imported: Vec<_> = report
            .imported
            .iter()
            .map(|row| (row.line, row.user_id, row.exemption_type))
            .collect();
        assert_eq!(
            imported,
            vec![
                (2, ANA, ExemptionType::HistoricoIser),
                (3, LUIS, ExemptionType::Recontratacion),
                (4, ANA, ExemptionType::TrasladoInterno),
            ]
        );

        let luis = store.exemptions_for_user(LUIS).unwrap();
        assert_eq!(luis.len(), 1);
        assert_eq!(luis[0].notes.as_deref(), Some("Second term"));
        assert_eq!(
            luis[0].valid_until.map(|until| until.to_rfc3339()),
            Some("2025-12-31T23:59:59+00:00".to_string())
        );
        assert_eq!(store.exemptions_for_user(ANA).unwrap().len(), 2);
    }

    #[test]
    fn bad_rows_are_reported_with_their_line() {
        let (_, importer) = importer();
        let csv = "\
Email,ExemptionType,ValidFrom,ValidUntil
nobody@iser.edu.co,rehire,2025-01-01,
ana@iser.edu.co,vacaciones,2025-01-01,
ana@iser.edu.co,rehire,01/01/2025,
ana@iser.edu.co,rehire,2025-03-01,2025-02-01
,rehire,2025-01-01,
luis@iser.edu.co,rehire,2025-01-01,
";
        let report = importer.from_reader(csv.as_bytes(), IMPORTER).unwrap();

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.imported[0].line, 7);
        let issues: Vec<_> = report
            .issues
            .iter()
            .map(|issue| (issue.line, issue.message.as_str()))
            .collect();
        assert_eq!(
            issues,
            vec![
                (2, "user not found: email nobody@iser.edu.co"),
                (3, "unknown exemption type vacaciones"),
                (4, "invalid validfrom date 01/01/2025"),
                (5, "exemption validity ends before it starts"),
                (6, "no email, username or idnumber given"),
            ]
        );
    }

    #[test]
    fn missing_columns_abort_before_any_row() {
        let (store, importer) = importer();

        let err = importer
            .from_reader("email,exemptiontype\nana@iser.edu.co,rehire\n".as_bytes(), IMPORTER)
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn(ref column) if column == "validfrom"));

        let err = importer
            .from_reader("exemptiontype,validfrom\nrehire,2025-01-01\n".as_bytes(), IMPORTER)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "exemption CSV is missing the email|username|idnumber column"
        );
        assert!(store.exemptions_for_user(ANA).unwrap().is_empty());
    }

    #[test]
    fn importer_without_capability_is_refused_before_any_row() {
        let (store, importer) = importer();
        let csv = "email,exemptiontype,validfrom\nana@iser.edu.co,rehire,2025-01-01\n";

        let err = importer.from_reader(csv.as_bytes(), UserId(5)).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Exemption(ExemptionError::PermissionDenied { .. })
        ));
        assert!(store.exemptions_for_user(ANA).unwrap().is_empty());

        let unknown_users = "\
email,exemptiontype,validfrom
nobody@iser.edu.co,rehire,2025-01-01
ghost@iser.edu.co,rehire,2025-01-01
";
        let err = importer
            .from_reader(unknown_users.as_bytes(), UserId(5))
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::Exemption(ExemptionError::PermissionDenied { .. })
        ));
    }
}
