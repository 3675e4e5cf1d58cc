use std::collections::HashMap;

use reqwest::Url;
use uuid::Uuid;

use super::WorkerId;

/// An open page the worker may control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub url: Url,
    pub controller: Option<WorkerId>,
}

#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, url: Url, controller: Option<WorkerId>) -> Client {
        let client = Client {
            id: Uuid::new_v4().to_string(),
            url,
            controller,
        };
        self.clients.insert(client.id.clone(), client.clone());
        client
    }

    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn close(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Take control of every client on `origin`. Returns how many changed
    /// controller.
    pub fn claim(&mut self, worker: WorkerId, origin: &Url) -> usize {
        let mut claimed = 0;
        for client in self.clients.values_mut() {
            if client.url.origin() == origin.origin() && client.controller != Some(worker) {
                client.controller = Some(worker);
                claimed += 1;
            }
        }
        claimed
    }

    /// Hand every client controlled by `from` over to `to`.
    pub fn transfer(&mut self, from: WorkerId, to: WorkerId) -> usize {
        let mut moved = 0;
        for client in self.clients.values_mut() {
            if client.controller == Some(from) {
                client.controller = Some(to);
                moved += 1;
            }
        }
        moved
    }

    pub fn controlled_by(&self, worker: WorkerId) -> usize {
        self.clients
            .values()
            .filter(|c| c.controller == Some(worker))
            .count()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
