//! Remote list storage.
//!
//! [`RemoteList`] is the seam between the synchronization client and the
//! service holding visitor records; [`GraphClient`] implements it against a
//! SharePoint list through the Microsoft Graph API.

pub mod fields;
mod graph;

pub use fields::{create_fields, remote_name, title_for, update_fields, DEFAULT_TITLE};
pub use graph::GraphClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// One item of the remote list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// Opaque item handle used for updates.
    pub id: String,
    /// Column values.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// A remote list of visitor items.
#[async_trait]
pub trait RemoteList: Send + Sync {
    /// Create an item with the given columns and return the service's reply.
    async fn create(&self, fields: Map<String, Value>) -> Result<Value>;

    /// Fetch every item with its columns, in service order.
    async fn list(&self) -> Result<Vec<ListItem>>;

    /// Apply a partial update to the item identified by `item_id`.
    async fn update(&self, item_id: &str, fields: Map<String, Value>) -> Result<Value>;

    /// First item whose column `name` stringifies equal to `value`.
    ///
    /// This is a linear scan over [`RemoteList::list`].
    async fn find_by_field(&self, name: &str, value: &str) -> Result<Option<ListItem>> {
        let items = self.list().await?;
        Ok(items.into_iter().find(|item| {
            item.fields
                .get(name)
                .is_some_and(|field| fields::stringify(field) == value)
        }))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory [`RemoteList`] for tests.

    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    #[derive(Debug, Default)]
    pub(crate) struct FakeRemote {
        pub items: Mutex<Vec<ListItem>>,
        pub fail: bool,
    }

    impl FakeRemote {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn with_items(items: Vec<ListItem>) -> Self {
            Self {
                items: Mutex::new(items),
                fail: false,
            }
        }

        pub fn snapshot(&self) -> Vec<ListItem> {
            self.items.lock().unwrap().clone()
        }

        fn check(&self) -> Result<()> {
            if self.fail {
                Err(Error::remote_status(503, "service unavailable"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RemoteList for FakeRemote {
        async fn create(&self, fields: Map<String, Value>) -> Result<Value> {
            self.check()?;
            let mut items = self.items.lock().unwrap();
            let id = (items.len() + 1).to_string();
            items.push(ListItem {
                id: id.clone(),
                fields: fields.clone(),
            });
            Ok(serde_json::json!({ "id": id, "fields": fields }))
        }

        async fn list(&self) -> Result<Vec<ListItem>> {
            self.check()?;
            Ok(self.snapshot())
        }

        async fn update(&self, item_id: &str, fields: Map<String, Value>) -> Result<Value> {
            self.check()?;
            let mut items = self.items.lock().unwrap();
            let item = items
                .iter_mut()
                .find(|item| item.id == item_id)
                .ok_or_else(|| Error::remote_status(404, "itemNotFound"))?;
            item.fields.extend(fields);
            Ok(Value::Object(item.fields.clone()))
        }
    }

    pub(crate) fn item(id: &str, cedula: &str) -> ListItem {
        let mut fields = Map::new();
        fields.insert("Cedula".to_string(), Value::String(cedula.to_string()));
        fields.insert("Nombre".to_string(), Value::String(format!("Visitor {id}")));
        ListItem {
            id: id.to_string(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{item, FakeRemote};
    use super::*;

    #[tokio::test]
    async fn test_find_by_field_returns_first_match() {
        let mut duplicate = item("3", "8-888-888");
        duplicate
            .fields
            .insert("Nombre".to_string(), Value::String("Later".to_string()));
        let remote = FakeRemote::with_items(vec![
            item("1", "1-111-111"),
            item("2", "8-888-888"),
            duplicate,
        ]);

        let found = remote.find_by_field("Cedula", "8-888-888").await.unwrap();
        assert_eq!(found.unwrap().id, "2");
    }

    #[tokio::test]
    async fn test_find_by_field_is_case_sensitive() {
        let remote = FakeRemote::with_items(vec![item("1", "AB-1")]);
        assert!(remote.find_by_field("Cedula", "ab-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_field_compares_numbers_as_text() {
        let mut numeric = item("1", "");
        numeric
            .fields
            .insert("Cedula".to_string(), serde_json::json!(12345));
        let remote = FakeRemote::with_items(vec![numeric]);

        assert!(remote.find_by_field("Cedula", "12345").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_by_field_missing_column() {
        let remote = FakeRemote::with_items(vec![item("1", "x")]);
        assert!(remote.find_by_field("Other", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_field_propagates_errors() {
        let remote = FakeRemote::failing();
        let err = remote.find_by_field("Cedula", "x").await.unwrap_err();
        assert!(err.is_remote());
    }

    #[test]
    fn test_list_item_deserialize() {
        let item: ListItem = serde_json::from_str(
            r#"{"id": "7", "fields": {"Cedula": "8-888-888"}, "webUrl": "https://x"}"#,
        )
        .unwrap();
        assert_eq!(item.id, "7");
        assert_eq!(item.fields["Cedula"], "8-888-888");
    }
}
