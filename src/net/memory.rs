//! In-process network stores
//!
//! [`MemoryHub`] is a shared key-value tree that several [`MemoryStore`]
//! clients connect to, which is enough to run multiple peers in one process
//! (tests, the headless driver). [`OfflineStore`] refuses everything, which
//! is what the game sees with no network at all.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use serde_json::{Map, Value};

use super::{NetError, NetworkStore, Snapshot};

#[derive(Debug, Default)]
struct HubInner {
    /// Full key (`path/id`) to value
    data: BTreeMap<String, Value>,
    next_client: u64,
    /// Client to subscribed paths
    subscriptions: HashMap<u64, Vec<String>>,
    inboxes: HashMap<u64, VecDeque<Snapshot>>,
    on_disconnect: HashMap<u64, Vec<String>>,
}

impl HubInner {
    fn snapshot(&self, path: &str) -> Snapshot {
        let prefix = format!("{path}/");
        let children: Map<String, Value> = self
            .data
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|id| (id.to_string(), v.clone())))
            .collect();
        Snapshot {
            path: path.to_string(),
            value: (!children.is_empty()).then_some(Value::Object(children)),
        }
    }

    fn notify(&mut self, path: &str) {
        let snapshot = self.snapshot(path);
        for (client, paths) in &self.subscriptions {
            if paths.iter().any(|p| p == path) {
                self.inboxes
                    .entry(*client)
                    .or_default()
                    .push_back(snapshot.clone());
            }
        }
    }

    fn remove_key(&mut self, key: &str) {
        if self.data.remove(key).is_some() {
            if let Some((path, _)) = key.split_once('/') {
                self.notify(path);
            }
        }
    }
}

/// Shared store that in-process clients connect to
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    inner: Rc<RefCell<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new client connection
    pub fn connect(&self) -> MemoryStore {
        let mut inner = self.inner.borrow_mut();
        let client = inner.next_client;
        inner.next_client += 1;
        MemoryStore {
            hub: self.inner.clone(),
            client,
            online: true,
        }
    }

    /// Current value of a key
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.borrow().data.get(key).cloned()
    }

    /// Number of children under a path
    pub fn count(&self, path: &str) -> usize {
        let prefix = format!("{path}/");
        self.inner
            .borrow()
            .data
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .count()
    }
}

/// One client of a [`MemoryHub`]
#[derive(Debug)]
pub struct MemoryStore {
    hub: Rc<RefCell<HubInner>>,
    client: u64,
    online: bool,
}

impl MemoryStore {
    /// Drop the connection, running any registered disconnect removals
    pub fn disconnect(&mut self) {
        if !self.online {
            return;
        }
        self.online = false;
        let mut hub = self.hub.borrow_mut();
        hub.subscriptions.remove(&self.client);
        hub.inboxes.remove(&self.client);
        let pending = hub.on_disconnect.remove(&self.client).unwrap_or_default();
        for key in pending {
            hub.remove_key(&key);
        }
        log::debug!("Client {} disconnected", self.client);
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    fn check(&self, key: &str) -> Result<(), NetError> {
        if !self.online {
            return Err(NetError::Offline);
        }
        match key.split_once('/') {
            Some((path, id)) if !path.is_empty() && !id.is_empty() && !id.contains('/') => Ok(()),
            _ => Err(NetError::BadKey(key.to_string())),
        }
    }
}

impl NetworkStore for MemoryStore {
    fn set(&mut self, key: &str, value: Value) -> Result<(), NetError> {
        self.check(key)?;
        let mut hub = self.hub.borrow_mut();
        hub.data.insert(key.to_string(), value);
        if let Some((path, _)) = key.split_once('/') {
            hub.notify(path);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), NetError> {
        self.check(key)?;
        self.hub.borrow_mut().remove_key(key);
        Ok(())
    }

    fn remove_on_disconnect(&mut self, key: &str) -> Result<(), NetError> {
        self.check(key)?;
        self.hub
            .borrow_mut()
            .on_disconnect
            .entry(self.client)
            .or_default()
            .push(key.to_string());
        Ok(())
    }

    fn subscribe(&mut self, path: &str) -> Result<(), NetError> {
        if !self.online {
            return Err(NetError::Offline);
        }
        let mut hub = self.hub.borrow_mut();
        hub.subscriptions
            .entry(self.client)
            .or_default()
            .push(path.to_string());
        // New subscribers get the current contents straight away
        let snapshot = hub.snapshot(path);
        hub.inboxes.entry(self.client).or_default().push_back(snapshot);
        Ok(())
    }

    fn poll(&mut self) -> Vec<Snapshot> {
        if !self.online {
            return Vec::new();
        }
        self.hub
            .borrow_mut()
            .inboxes
            .get_mut(&self.client)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// A store with no connection
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

impl NetworkStore for OfflineStore {
    fn set(&mut self, _key: &str, _value: Value) -> Result<(), NetError> {
        Err(NetError::Offline)
    }

    fn remove(&mut self, _key: &str) -> Result<(), NetError> {
        Err(NetError::Offline)
    }

    fn remove_on_disconnect(&mut self, _key: &str) -> Result<(), NetError> {
        Err(NetError::Offline)
    }

    fn subscribe(&mut self, _path: &str) -> Result<(), NetError> {
        Err(NetError::Offline)
    }

    fn poll(&mut self) -> Vec<Snapshot> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribers_see_full_path_contents() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();
        b.subscribe("players").unwrap();
        assert_eq!(b.poll(), vec![Snapshot { path: "players".into(), value: None }]);

        a.set("players/a", json!({ "x": 1 })).unwrap();
        a.set("bombs/z", json!({ "x": 2 })).unwrap();
        let snaps = b.poll();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].value, Some(json!({ "a": { "x": 1 } })));
    }

    #[test]
    fn test_disconnect_runs_removals() {
        let hub = MemoryHub::new();
        let mut watcher = hub.connect();
        watcher.subscribe("players").unwrap();
        {
            let mut a = hub.connect();
            a.set("players/a", json!(1)).unwrap();
            a.remove_on_disconnect("players/a").unwrap();
            assert_eq!(hub.count("players"), 1);
        }
        assert_eq!(hub.count("players"), 0);
        let last = watcher.poll().pop().unwrap();
        assert_eq!(last.value, None);
    }

    #[test]
    fn test_offline_and_bad_keys() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();
        assert!(matches!(a.set("players", json!(1)), Err(NetError::BadKey(_))));
        assert!(matches!(a.set("players/a/b", json!(1)), Err(NetError::BadKey(_))));
        a.disconnect();
        assert!(matches!(a.set("players/a", json!(1)), Err(NetError::Offline)));
        assert!(a.poll().is_empty());

        let mut off = OfflineStore;
        assert!(off.subscribe("players").is_err());
        assert!(off.poll().is_empty());
    }
}
