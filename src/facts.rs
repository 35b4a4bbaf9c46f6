//! Host inventory records synced alongside the metrics
//!
//! These are the shapes exchanged with the remote inventory endpoints. Each
//! record implements [`ComparableData`] so a sync routine can pair local
//! and remote entries by key and compare them without the remote id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identity a record is matched on between local and remote state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FactKey {
    Text(String),
    Number(i64),
}

pub trait ComparableData {
    /// Remote id, empty for records that were never synced
    fn id(&self) -> &str;

    fn key(&self) -> FactKey;

    /// Copy of the record without the remote id and without fields that
    /// change on every read
    fn data(&self) -> Self
    where
        Self: Sized;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerData {
    pub version: String,
    pub load: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub uuid: String,
    pub cpu_type: String,
    pub cpu_brand: String,
    pub cpu_physical_cores: i32,
    pub cpu_logical_cores: i32,
    pub physical_memory: u64,
    pub hardware_vendor: String,
    pub hardware_model: String,
    pub hardware_serial: String,
    pub computer_name: String,
    pub hostname: String,
    pub local_hostname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub version: String,
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
    pub platform: String,
    pub platform_like: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub datetime: String,
    pub boot_time: u64,
    pub timezone: String,
    pub uptime: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub uid: i32,
    pub gid: i32,
    pub username: String,
    pub description: String,
    pub directory: String,
    pub shell: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub gid: i32,
    #[serde(rename = "groupname")]
    pub group_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPackageData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub version: String,
    pub source: String,
    pub arch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub mac: String,
    #[serde(rename = "type")]
    pub kind: i32,
    pub flags: i32,
    pub mtu: i32,
    pub link_speed: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub address: String,
    pub broadcast: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interface_name: String,
    pub mask: String,
}

/// Full inventory snapshot of the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitData {
    pub version: String,
    pub load: f64,
    pub info: SystemData,
    pub os: OsData,
    pub time: TimeData,
    pub users: Vec<UserData>,
    pub groups: Vec<GroupData>,
    pub interfaces: Vec<Interface>,
    pub addresses: Vec<Address>,
    pub packages: Vec<SystemPackageData>,
}

impl ComparableData for SystemData {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> FactKey {
        FactKey::Text(self.uuid.clone())
    }

    fn data(&self) -> Self {
        Self {
            id: String::new(),
            ..self.clone()
        }
    }
}

impl ComparableData for OsData {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> FactKey {
        FactKey::Text(self.name.clone())
    }

    fn data(&self) -> Self {
        Self {
            id: String::new(),
            ..self.clone()
        }
    }
}

impl ComparableData for TimeData {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> FactKey {
        FactKey::Text(self.timezone.clone())
    }

    /// Boot time is derived from the clock and jitters between reads
    fn data(&self) -> Self {
        Self {
            id: String::new(),
            boot_time: 0,
            ..self.clone()
        }
    }
}

impl ComparableData for UserData {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> FactKey {
        FactKey::Text(self.username.clone())
    }

    fn data(&self) -> Self {
        Self {
            id: String::new(),
            description: String::new(),
            ..self.clone()
        }
    }
}

impl ComparableData for GroupData {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> FactKey {
        FactKey::Number(self.gid.into())
    }

    fn data(&self) -> Self {
        Self {
            id: String::new(),
            ..self.clone()
        }
    }
}

impl ComparableData for Interface {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> FactKey {
        FactKey::Text(self.name.clone())
    }

    fn data(&self) -> Self {
        Self {
            id: String::new(),
            ..self.clone()
        }
    }
}

impl ComparableData for Address {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> FactKey {
        FactKey::Text(self.address.clone())
    }

    fn data(&self) -> Self {
        Self {
            id: String::new(),
            ..self.clone()
        }
    }
}

impl ComparableData for SystemPackageData {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> FactKey {
        FactKey::Text(self.name.clone())
    }

    fn data(&self) -> Self {
        Self {
            id: String::new(),
            ..self.clone()
        }
    }
}

/// Inventory resource synced to its own endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Server,
    Info,
    Os,
    Time,
    Groups,
    Users,
    Interfaces,
    Addresses,
    Packages,
}

/// Endpoint layout of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitDef {
    /// One record per host (`false`) or a list of records (`true`)
    #[serde(rename = "multirow")]
    pub multi_row: bool,
    pub url: &'static str,
    pub url_suffix: &'static str,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::Server,
        Resource::Info,
        Resource::Os,
        Resource::Time,
        Resource::Groups,
        Resource::Users,
        Resource::Interfaces,
        Resource::Addresses,
        Resource::Packages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Server => "server",
            Resource::Info => "info",
            Resource::Os => "os",
            Resource::Time => "time",
            Resource::Groups => "groups",
            Resource::Users => "users",
            Resource::Interfaces => "interfaces",
            Resource::Addresses => "addresses",
            Resource::Packages => "packages",
        }
    }

    pub fn commit_def(&self) -> CommitDef {
        let (multi_row, url) = match self {
            Resource::Server => (false, "/api/servers/servers/"),
            Resource::Info => (false, "/api/proc/info/"),
            Resource::Os => (false, "/api/proc/os/"),
            Resource::Time => (false, "/api/proc/time/"),
            Resource::Groups => (true, "/api/proc/groups/"),
            Resource::Users => (true, "/api/proc/users/"),
            Resource::Interfaces => (true, "/api/proc/interfaces/"),
            Resource::Addresses => (true, "/api/proc/addresses/"),
            Resource::Packages => (true, "/api/proc/packages/"),
        };

        CommitDef {
            multi_row,
            url,
            url_suffix: if multi_row { "sync/" } else { "-/sync/" },
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown resource: {0}")]
pub struct UnknownResource(String);

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownResource(s.to_string()))
    }
}

/// Endpoint layout of the resource named `resource`
pub fn commit_def(resource: &str) -> Option<CommitDef> {
    resource.parse::<Resource>().ok().map(|r| r.commit_def())
}
