use serde::{Deserialize, Serialize};
use std::fmt;

/// Who may see the leaderboard entries of a phase split.
///
/// Stored as the small integer used by challenge manifests (`1`, `2`, `3`)
/// and serialized over the API as a snake_case name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "i32", db_type = "Integer")
)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only members of the hosting team.
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 1))]
    Host,
    /// Hosts, plus the team that owns a given entry.
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 2))]
    OwnerAndHost,
    /// Everyone.
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 3))]
    Public,
}

impl Visibility {
    pub const ALL: &'static [Visibility] = &[Self::Host, Self::OwnerAndHost, Self::Public];

    /// Manifest code of this tier.
    pub fn code(&self) -> i32 {
        match self {
            Self::Host => 1,
            Self::OwnerAndHost => 2,
            Self::Public => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Host),
            2 => Some(Self::OwnerAndHost),
            3 => Some(Self::Public),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::OwnerAndHost => "owner_and_host",
            Self::Public => "public",
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Public
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
