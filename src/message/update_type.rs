use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::ProtocolError;

/// Kind of policy mutation carried by a [`super::Message`].
///
/// Wire names match the method names of the Go `casbin-psql-watcher`. Its
/// deflated `TransmittedMSG` wrapper is not understood, so only the names line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateType {
    FullReload,
    AddOne,
    RemoveOne,
    RemoveFiltered,
    AddMany,
    RemoveMany,
    UpdateOne,
    UpdateMany,
    SaveAll,
    LoadAll,
}

impl UpdateType {
    pub const ALL: [UpdateType; 10] = [
        UpdateType::FullReload,
        UpdateType::AddOne,
        UpdateType::RemoveOne,
        UpdateType::RemoveFiltered,
        UpdateType::AddMany,
        UpdateType::RemoveMany,
        UpdateType::UpdateOne,
        UpdateType::UpdateMany,
        UpdateType::SaveAll,
        UpdateType::LoadAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::FullReload => "Update",
            UpdateType::AddOne => "UpdateForAddPolicy",
            UpdateType::RemoveOne => "UpdateForRemovePolicy",
            UpdateType::RemoveFiltered => "UpdateForRemoveFilteredPolicy",
            UpdateType::AddMany => "UpdateForAddPolicies",
            UpdateType::RemoveMany => "UpdateForRemovePolicies",
            UpdateType::UpdateOne => "UpdateForUpdatePolicy",
            UpdateType::UpdateMany => "UpdateForUpdatePolicies",
            UpdateType::SaveAll => "UpdateForSavePolicy",
            UpdateType::LoadAll => "UpdateForLoadPolicy",
        }
    }

    /// Whether replaying this update means re-reading the whole model.
    pub fn is_reload(&self) -> bool {
        matches!(
            self,
            UpdateType::FullReload | UpdateType::SaveAll | UpdateType::LoadAll
        )
    }
}

impl fmt::Display for UpdateType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UpdateType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownOperation(s.to_string()))
    }
}

impl Serialize for UpdateType {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UpdateType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
