use crate::materializer::Materializer;
use crate::store::{ContractStore, FieldRegistry, TemplateRegistry};
use std::path::PathBuf;
use std::sync::Arc;

/// Stores and services shared by the HTTP handlers, registered as
/// `web::Data<AppState>`. Job plumbing lives apart in `JobsState`.
#[derive(Clone)]
pub struct AppState {
    pub templates: Arc<dyn TemplateRegistry>,
    pub fields: Arc<dyn FieldRegistry>,
    pub contracts: Arc<dyn ContractStore>,
    pub materializer: Arc<Materializer>,
    /// Where uploaded template files are kept.
    pub templates_dir: PathBuf,
    pub upload_limit_bytes: usize,
}
