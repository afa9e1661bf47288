use fairtable_core::{BanCertificate, CommitCertificate};
use fairtable_state::Session;

/// Observer of decided rounds. Called after the session has been updated.
pub trait NodeEventSink: Send + Sync {
    fn on_commit(&self, cert: &CommitCertificate, session: &Session);
    fn on_ban(&self, cert: &BanCertificate, session: &Session);
    fn on_expelled(&self, cert: &BanCertificate);
}
