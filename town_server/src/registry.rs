use net::channels::RouterTx;
use session::{SessionToken, TownId};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::actor::{spawn_town, TownHandle};
use crate::broadcast::RouterBroadcaster;
use crate::error::{RegistryError, TownError};
use crate::map::AreaDefinition;
use crate::protocol::{ConversationAreaModel, TownSummary, ViewingAreaModel};
use crate::town::Town;

/// Returned once, to whoever created the town.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTown {
    pub town_id: TownId,
    pub update_password: String,
}

struct TownEntry {
    handle: TownHandle,
    update_password: String,
    task: JoinHandle<()>,
}

/// Directory of running towns. Constructed once at startup and shared by
/// reference; every town gets the same map and capacity.
pub struct TownRegistry {
    towns: RwLock<Vec<TownEntry>>,
    router_tx: RouterTx,
    map: Vec<AreaDefinition>,
    capacity: usize,
    master_password: Option<String>,
}

impl TownRegistry {
    pub fn new(router_tx: RouterTx, map: Vec<AreaDefinition>, capacity: usize) -> Self {
        Self {
            towns: RwLock::new(Vec::new()),
            router_tx,
            map,
            capacity,
            master_password: None,
        }
    }

    /// Accept `password` in place of any town's update password.
    pub fn with_master_password(mut self, password: Option<String>) -> Self {
        self.master_password = password.filter(|p| !p.is_empty());
        self
    }

    pub async fn create_town(&self, friendly_name: &str, is_publicly_listed: bool) -> Result<CreatedTown, RegistryError> {
        let mut towns = self.towns.write().await;
        let town_id = loop {
            let id = TownId::generate();
            if !towns.iter().any(|e| *e.handle.id() == id) {
                break id;
            }
        };
        self.spawn_into(&mut towns, town_id, friendly_name, is_publicly_listed)
    }

    /// Create a town with a caller-chosen id, e.g. the default lobby.
    pub async fn create_town_with_id(
        &self,
        town_id: TownId,
        friendly_name: &str,
        is_publicly_listed: bool,
    ) -> Result<CreatedTown, RegistryError> {
        let mut towns = self.towns.write().await;
        if towns.iter().any(|e| *e.handle.id() == town_id) {
            return Err(RegistryError::TownIdInUse(town_id.to_string()));
        }
        self.spawn_into(&mut towns, town_id, friendly_name, is_publicly_listed)
    }

    fn spawn_into(
        &self,
        towns: &mut Vec<TownEntry>,
        town_id: TownId,
        friendly_name: &str,
        is_publicly_listed: bool,
    ) -> Result<CreatedTown, RegistryError> {
        if friendly_name.is_empty() {
            return Err(RegistryError::EmptyFriendlyName);
        }
        let broadcaster = RouterBroadcaster::new(town_id.clone(), self.router_tx.clone());
        let mut town = Town::new(
            town_id.clone(),
            friendly_name,
            is_publicly_listed,
            self.capacity,
            Box::new(broadcaster),
        );
        town.initialize_areas(&self.map)?;
        let (handle, task) = spawn_town(town);
        let update_password = Uuid::new_v4().to_string();
        towns.push(TownEntry {
            handle,
            update_password: update_password.clone(),
            task,
        });
        tracing::info!(town = %town_id, name = friendly_name, public = is_publicly_listed, "town created");
        Ok(CreatedTown {
            town_id,
            update_password,
        })
    }

    pub async fn get(&self, town_id: &TownId) -> Option<TownHandle> {
        let towns = self.towns.read().await;
        towns
            .iter()
            .find(|e| e.handle.id() == town_id)
            .map(|e| e.handle.clone())
    }

    /// Summaries of every publicly listed town.
    pub async fn list_towns(&self) -> Vec<TownSummary> {
        let handles: Vec<TownHandle> = {
            let towns = self.towns.read().await;
            towns.iter().map(|e| e.handle.clone()).collect()
        };
        let mut listed = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.summary().await {
                Ok(summary) if summary.is_publicly_listed => listed.push(summary),
                Ok(_) => {}
                Err(e) => tracing::debug!(town = %handle.id(), "skipping town: {}", e),
            }
        }
        listed
    }

    fn password_matches(&self, entry: &TownEntry, password: &str) -> bool {
        entry.update_password == password || self.master_password.as_deref() == Some(password)
    }

    async fn authorized_handle(&self, town_id: &TownId, password: &str) -> Result<TownHandle, RegistryError> {
        let towns = self.towns.read().await;
        let entry = towns
            .iter()
            .find(|e| e.handle.id() == town_id)
            .ok_or(RegistryError::TownNotFound)?;
        if !self.password_matches(entry, password) {
            return Err(RegistryError::InvalidPassword);
        }
        Ok(entry.handle.clone())
    }

    pub async fn update_town(
        &self,
        town_id: &TownId,
        password: &str,
        friendly_name: Option<String>,
        is_publicly_listed: Option<bool>,
    ) -> Result<(), RegistryError> {
        let handle = self.authorized_handle(town_id, password).await?;
        handle.update_settings(friendly_name, is_publicly_listed).await?;
        tracing::info!(town = %town_id, "town settings updated");
        Ok(())
    }

    /// Close a town: its players hear `townClosing` and are disconnected.
    pub async fn delete_town(&self, town_id: &TownId, password: &str) -> Result<(), RegistryError> {
        let entry = {
            let mut towns = self.towns.write().await;
            let idx = towns
                .iter()
                .position(|e| e.handle.id() == town_id)
                .ok_or(RegistryError::TownNotFound)?;
            if !self.password_matches(&towns[idx], password) {
                return Err(RegistryError::InvalidPassword);
            }
            towns.remove(idx)
        };
        close_entry(entry).await;
        tracing::info!(town = %town_id, "town deleted");
        Ok(())
    }

    pub async fn create_conversation_area(
        &self,
        town_id: &TownId,
        session_token: SessionToken,
        model: ConversationAreaModel,
    ) -> Result<(), RegistryError> {
        let handle = self.get(town_id).await.ok_or(RegistryError::TownNotFound)?;
        handle.create_conversation_area(session_token, model).await
    }

    pub async fn create_viewing_area(
        &self,
        town_id: &TownId,
        session_token: SessionToken,
        model: ViewingAreaModel,
    ) -> Result<(), RegistryError> {
        let handle = self.get(town_id).await.ok_or(RegistryError::TownNotFound)?;
        handle.create_viewing_area(session_token, model).await
    }

    /// Close every town. Used on process shutdown.
    pub async fn shutdown(&self) {
        let entries: Vec<TownEntry> = {
            let mut towns = self.towns.write().await;
            towns.drain(..).collect()
        };
        let count = entries.len();
        for entry in entries {
            close_entry(entry).await;
        }
        tracing::info!(towns = count, "registry shut down");
    }

    pub async fn len(&self) -> usize {
        self.towns.read().await.len()
    }
}

async fn close_entry(entry: TownEntry) {
    match entry.handle.close().await {
        Ok(()) | Err(TownError::TownClosed) => {}
        Err(e) => tracing::warn!(town = %entry.handle.id(), "close failed: {}", e),
    }
    if let Err(e) = entry.task.await {
        tracing::warn!(town = %entry.handle.id(), "town task ended abnormally: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use net::channels::{RouterMsg, RouterRx};
    use tokio::sync::mpsc;

    fn registry() -> (TownRegistry, RouterRx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TownRegistry::new(tx, Vec::new(), 10), rx)
    }

    #[tokio::test]
    async fn create_and_list() {
        let (reg, _rx) = registry();
        let public = reg.create_town("Public", true).await.unwrap();
        reg.create_town("Hidden", false).await.unwrap();

        let listed = reg.list_towns().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].town_id, public.town_id.to_string());
        assert_eq!(listed[0].maximum_occupancy, 10);
        assert_eq!(reg.len().await, 2);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let (reg, _rx) = registry();
        assert_eq!(reg.create_town("", true).await, Err(RegistryError::EmptyFriendlyName));
        assert_eq!(reg.len().await, 0);
    }

    #[tokio::test]
    async fn fixed_id_cannot_be_reused() {
        let (reg, _rx) = registry();
        reg.create_town_with_id(TownId::from("LOBBY"), "Lobby", true)
            .await
            .unwrap();
        assert_eq!(
            reg.create_town_with_id(TownId::from("LOBBY"), "Again", true).await,
            Err(RegistryError::TownIdInUse("LOBBY".into()))
        );
    }

    #[tokio::test]
    async fn update_requires_password() {
        let (reg, _rx) = registry();
        let t = reg.create_town("Old", true).await.unwrap();

        assert_eq!(
            reg.update_town(&t.town_id, "wrong", Some("New".into()), None).await,
            Err(RegistryError::InvalidPassword)
        );
        assert_eq!(
            reg.update_town(&t.town_id, &t.update_password, Some(String::new()), Some(false))
                .await,
            Err(RegistryError::Town(TownError::InvalidValues))
        );
        reg.update_town(&t.town_id, &t.update_password, Some("New".into()), Some(false))
            .await
            .unwrap();
        assert!(reg.list_towns().await.is_empty());
        let summary = reg.get(&t.town_id).await.unwrap().summary().await.unwrap();
        assert_eq!(summary.friendly_name, "New");
    }

    #[tokio::test]
    async fn master_password_unlocks_any_town() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let reg = TownRegistry::new(tx, Vec::new(), 10).with_master_password(Some("root".into()));
        let t = reg.create_town("Town", true).await.unwrap();
        reg.update_town(&t.town_id, "root", None, Some(false)).await.unwrap();
        reg.delete_town(&t.town_id, "root").await.unwrap();
        assert!(reg.get(&t.town_id).await.is_none());
    }

    #[tokio::test]
    async fn empty_master_password_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let reg = TownRegistry::new(tx, Vec::new(), 10).with_master_password(Some(String::new()));
        let t = reg.create_town("Town", true).await.unwrap();
        assert_eq!(reg.delete_town(&t.town_id, "").await, Err(RegistryError::InvalidPassword));
    }

    #[tokio::test]
    async fn delete_closes_town() {
        let (reg, mut rx) = registry();
        let t = reg.create_town("Doomed", true).await.unwrap();
        assert_eq!(
            reg.delete_town(&TownId::from("NOPE"), &t.update_password).await,
            Err(RegistryError::TownNotFound)
        );
        reg.delete_town(&t.town_id, &t.update_password).await.unwrap();
        assert!(reg.get(&t.town_id).await.is_none());

        let mut saw_close = false;
        while let Ok(msg) = rx.try_recv() {
            if let RouterMsg::Output { disconnect: true, text, .. } = msg {
                assert_eq!(text, r#"{"type":"townClosing"}"#);
                saw_close = true;
            }
        }
        assert!(saw_close);
    }

    #[tokio::test]
    async fn area_creation_needs_known_town() {
        let (reg, _rx) = registry();
        let err = reg
            .create_viewing_area(
                &TownId::from("NOPE"),
                SessionToken("t".into()),
                ViewingAreaModel {
                    id: "View".into(),
                    occupants: Vec::new(),
                    video: Some("v".into()),
                    is_playing: false,
                    elapsed_time_sec: 0.0,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::TownNotFound);
    }

    #[tokio::test]
    async fn shutdown_closes_everything() {
        let (reg, _rx) = registry();
        let t = reg.create_town("A", true).await.unwrap();
        let handle = reg.get(&t.town_id).await.unwrap();
        reg.create_town("B", true).await.unwrap();
        reg.shutdown().await;
        assert_eq!(reg.len().await, 0);
        assert!(handle.is_closed());
    }
}
