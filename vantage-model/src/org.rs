use crate::ids::{ClientId, ProjectId};

/// A client record; owns projects.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Client {
    pub id: ClientId,
    pub name: String,
}

impl Client {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ClientId::new(),
            name: name.into(),
        }
    }
}

/// A project groups scans and schedules under an optional client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub client_id: Option<ClientId>,
}

impl Project {
    pub fn new(name: impl Into<String>, client_id: Option<ClientId>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            client_id,
        }
    }
}
