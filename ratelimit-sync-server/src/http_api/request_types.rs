use paperclip::actix::Apiv2Schema;
use ratelimit_sync::reports::{Report as SyncReport, ResourceId};
use ratelimit_sync::snapshot::GenericSnapshot;
use serde::{Deserialize, Serialize};

// Views of the library types that can derive Apiv2Schema (needed to generate
// the OpenAPI specs).

#[derive(Debug, Eq, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct Resources {
    pub type_url: String,
    pub version: String,
    pub names: Vec<String>,
}

#[derive(Debug, Eq, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct Snapshot {
    pub role: String,
    pub resources: Vec<Resources>,
}

impl Snapshot {
    pub fn new(role: &str, snapshot: &GenericSnapshot) -> Self {
        let resources = snapshot
            .type_urls()
            .filter_map(|type_url| {
                snapshot.get_resources(type_url).map(|resources| Resources {
                    type_url: type_url.to_string(),
                    version: resources.version.clone(),
                    names: resources.items.keys().cloned().collect(),
                })
            })
            .collect();
        Self {
            role: role.to_string(),
            resources,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct Report {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub state: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<(&ResourceId, &SyncReport)> for Report {
    fn from((id, report): (&ResourceId, &SyncReport)) -> Self {
        Self {
            kind: format!("{:?}", id.kind),
            namespace: id.reference.namespace.clone(),
            name: id.reference.name.clone(),
            state: format!("{:?}", report.status(0).state),
            errors: report.errors.iter().map(ToString::to_string).collect(),
            warnings: report.warnings.clone(),
        }
    }
}
