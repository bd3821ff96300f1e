use crate::config::{ChallengeConfig, ConfigError, ValidatorConfig};
use crate::services::directory::{DirectoryError, IdentityDirectory};
use crate::services::history::ResultLog;
use crate::services::notices::{NoticeKind, NoticeTemplates};
use crate::services::sheet::{SheetError, SheetStore};
use crate::validation::username;
use common::jobs::{RowOutcome, RunSummary};
use common::model::account::Account;
use common::model::response::FormResponse;
use common::model::status::ResponseStatus;
use log::{error, info, warn};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Validates the unprocessed rows of a sheet against the identity directory.
///
/// A validator is built for one run from the run's configuration and a
/// logged-in directory session, and is dropped with them.
pub struct ResponseValidator<'a, D: IdentityDirectory + ?Sized> {
    directory: &'a D,
    challenge: &'a ChallengeConfig,
    templates: NoticeTemplates,
    notices_enabled: bool,
    write_pause: Duration,
    dry_run: bool,
    /// Open invitations to the access team, fetched on first use.
    invitations: Option<HashSet<String>>,
}

/// The status computed for a row, and what should follow once it is written.
struct Decision {
    status: ResponseStatus,
    account: Option<Account>,
    notice: Option<NoticeKind>,
    note: String,
}

impl Decision {
    fn resolved(status: ResponseStatus, note: &str) -> Self {
        Self {
            status,
            account: None,
            notice: None,
            note: note.to_string(),
        }
    }

    fn with_notice(status: ResponseStatus, account: Account, notice: NoticeKind) -> Self {
        Self {
            status,
            account: Some(account),
            notice: Some(notice),
            note: String::new(),
        }
    }
}

impl<'a, D: IdentityDirectory + ?Sized> ResponseValidator<'a, D> {
    pub fn new(config: &'a ValidatorConfig, directory: &'a D) -> Result<Self, ConfigError> {
        let templates = NoticeTemplates::new(&config.notices, &config.challenge)
            .map_err(|e| ConfigError::Invalid(format!("notice templates: {}", e)))?;
        Ok(Self {
            directory,
            challenge: &config.challenge,
            templates,
            notices_enabled: config.notices.enabled,
            write_pause: Duration::from_millis(config.directory.write_pause_ms),
            dry_run: false,
            invitations: None,
        })
    }

    /// In a dry run statuses are computed and logged but nothing is written to
    /// the sheet and nothing is sent to the directory.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Runs one pass over `sheet`.
    ///
    /// Only a failure to read the sheet aborts the run. Per-row failures are
    /// logged, counted as deferred in the returned summary, and leave the row
    /// unprocessed.
    pub fn run<S: SheetStore + ?Sized>(
        &mut self,
        sheet: &mut S,
        log: Option<&ResultLog>,
    ) -> Result<RunSummary, SheetError> {
        let run_id = Uuid::new_v4().to_string();
        info!(
            "Starting validation run {} for challenge {}{}",
            run_id,
            self.challenge.display_name(),
            if self.dry_run { " (dry run)" } else { "" }
        );
        if let Some(log) = log {
            if let Err(e) = log.start_run(&run_id, self.dry_run) {
                warn!("Could not record run start: {}", e);
            }
        }

        let rows = sheet.read_rows()?;
        let mut summary = RunSummary::new(run_id.clone(), self.dry_run);
        summary.examined = rows.len();

        let (done, pending): (Vec<FormResponse>, Vec<FormResponse>) =
            rows.into_iter().partition(|row| row.status.is_terminal());
        summary.skipped = done.len();
        for row in done.iter().filter(|r| matches!(r.status, ResponseStatus::Other(_))) {
            warn!(
                "Row {} has unrecognised status {:?}, leaving it alone",
                row.row_index,
                row.status.as_cell()
            );
        }

        if pending.is_empty() {
            info!("No new responses");
        }
        for response in &pending {
            let outcome = self.process_row(sheet, response, &run_id, log);
            summary.record(&outcome);
        }

        info!(
            "Run {} finished: {} row(s) examined, {} already processed, {} resolved, {} deferred",
            run_id,
            summary.examined,
            summary.skipped,
            summary.resolved_total(),
            summary.deferred
        );
        if let Some(log) = log {
            if let Err(e) = log.finish_run(&summary) {
                warn!("Could not record run totals: {}", e);
            }
        }
        Ok(summary)
    }

    fn process_row<S: SheetStore + ?Sized>(
        &mut self,
        sheet: &mut S,
        response: &FormResponse,
        run_id: &str,
        log: Option<&ResultLog>,
    ) -> RowOutcome {
        let (outcome, note) = self.resolve_row(sheet, response);
        if let Some(log) = log {
            let status = match &outcome {
                RowOutcome::Resolved(status) => status.clone(),
                RowOutcome::Deferred(_) => ResponseStatus::Unprocessed,
            };
            if let Err(e) = log.record(run_id, response, &status, &note) {
                warn!("Could not log result of row {}: {}", response.row_index, e);
            }
        }
        outcome
    }

    /// Decides, writes and notifies one row. Returns the outcome and the note
    /// kept in the result log.
    fn resolve_row<S: SheetStore + ?Sized>(
        &mut self,
        sheet: &mut S,
        response: &FormResponse,
    ) -> (RowOutcome, String) {
        let row = response.row_index;
        let deferred = |message: String| {
            let note = format!("deferred: {}", message);
            (RowOutcome::Deferred(message), note)
        };

        let decision = match self.decide(response) {
            Ok(decision) => decision,
            Err(e) if e.is_transient() => {
                warn!("Row {} ({:?}) left unprocessed, will retry: {}", row, response.username, e);
                return deferred(e.to_string());
            }
            Err(e) => {
                error!("Row {} ({:?}) left unprocessed: {}", row, response.username, e);
                return deferred(e.to_string());
            }
        };

        if !self.dry_run {
            if let Err(e) = sheet.write_status(row, &decision.status) {
                warn!("Row {} ({:?}) status not written: {}", row, response.username, e);
                return deferred(e.to_string());
            }
        }

        let mut note = decision.note;
        if let (Some(kind), Some(account)) = (decision.notice, decision.account.as_ref()) {
            let sent = self.notify(kind, response, account);
            note = if note.is_empty() {
                sent
            } else {
                format!("{}; {}", note, sent)
            };
        }

        info!("Row {} ({:?}): {}", row, response.username, decision.status);
        (RowOutcome::Resolved(decision.status), note)
    }

    fn decide(&mut self, response: &FormResponse) -> Result<Decision, DirectoryError> {
        let username = response.normalized_username();
        if !username::is_well_formed(username) {
            return Ok(Decision::resolved(
                ResponseStatus::InvalidUsername,
                "malformed username",
            ));
        }

        let Some(account) = self.directory.lookup_account(username)? else {
            return Ok(Decision::resolved(
                ResponseStatus::InvalidUsername,
                "no such account",
            ));
        };

        let challenge = self.challenge;
        match challenge.access_team.as_deref() {
            None => {
                if self.directory.is_registered(&account.id, &challenge.code)? {
                    Ok(Decision::resolved(ResponseStatus::Valid, "registered"))
                } else {
                    Ok(Decision::resolved(ResponseStatus::NotRegistered, "not registered"))
                }
            }
            Some(team) => self.decide_access(account, team, &challenge.code),
        }
    }

    fn decide_access(
        &mut self,
        account: Account,
        team: &str,
        code: &str,
    ) -> Result<Decision, DirectoryError> {
        if self.directory.is_registered(&account.id, team)? {
            return Ok(Decision::with_notice(
                ResponseStatus::AlreadyGranted,
                account,
                NoticeKind::AlreadyGranted,
            ));
        }
        if !self.directory.is_registered(&account.id, code)? {
            return Ok(Decision::with_notice(
                ResponseStatus::NotRegistered,
                account,
                NoticeKind::MissingRegistration,
            ));
        }
        if self.has_open_invitation(team, &account.id)? {
            return Ok(Decision::with_notice(
                ResponseStatus::PendingInvite,
                account,
                NoticeKind::PendingInvite,
            ));
        }

        let note = self.invite(team, &account)?;
        Ok(Decision {
            status: ResponseStatus::Valid,
            account: Some(account),
            notice: None,
            note,
        })
    }

    fn has_open_invitation(&mut self, team: &str, account_id: &str) -> Result<bool, DirectoryError> {
        if self.invitations.is_none() {
            let invitees = self.directory.open_invitations(team)?;
            self.invitations = Some(invitees.into_iter().collect());
        }
        Ok(self
            .invitations
            .as_ref()
            .is_some_and(|invitees| invitees.contains(account_id)))
    }

    fn invite(&mut self, team: &str, account: &Account) -> Result<String, DirectoryError> {
        let note = if self.dry_run {
            "dry run: invitation not sent".to_string()
        } else {
            let message = self.templates.invitation(&account.user_name);
            let sent = self.directory.send_invitation(team, &account.id, &message);
            self.pause();
            sent?;
            "invitation sent".to_string()
        };
        // Later submissions by the same account in this run see the invitation.
        self.invitations
            .get_or_insert_with(HashSet::new)
            .insert(account.id.clone());
        Ok(note)
    }

    fn notify(&self, kind: NoticeKind, response: &FormResponse, account: &Account) -> String {
        if !self.notices_enabled {
            return String::new();
        }
        if self.dry_run {
            return format!("dry run: notice '{}' not sent", kind.title());
        }

        let notice = self
            .templates
            .notice(kind, response.normalized_username());
        let sent = self.directory.send_notice(&account.id, &notice);
        self.pause();
        match sent {
            Ok(()) => format!("notice sent: {}", kind.title()),
            Err(e) => {
                warn!(
                    "Notice '{}' to row {} ({:?}) failed: {}",
                    kind.title(),
                    response.row_index,
                    response.username,
                    e
                );
                format!("notice failed: {}", e)
            }
        }
    }

    fn pause(&self) {
        if !self.write_pause.is_zero() {
            thread::sleep(self.write_pause);
        }
    }
}
