//! TableWalker - paginated walk over a table's dynamic fields.
//!
//! Pages are fetched one after another (each cursor comes from the previous
//! page). Child objects are then fetched concurrently and joined. Any failure
//! fails the whole walk; partial results are never returned.

use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use crate::domain::{BoardError, TableId};
use crate::ports::{DynamicFieldInfo, DynamicFieldName, LedgerError, LedgerReader, RawObject};

/// One resolved table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub name: DynamicFieldName,
    pub object: RawObject,
}

impl TableEntry {
    /// The key as stored on chain.
    pub fn key(&self) -> &Value {
        &self.name.value
    }

    /// `Field<K, V>.value` of the child object.
    pub fn value(&self) -> Option<&Value> {
        self.object.fields.as_ref()?.get("value")
    }
}

#[derive(Clone)]
pub struct TableWalker {
    ledger: Arc<dyn LedgerReader>,
    page_limit: Option<usize>,
}

impl TableWalker {
    pub fn new(ledger: Arc<dyn LedgerReader>, page_limit: Option<usize>) -> Self {
        Self { ledger, page_limit }
    }

    /// All dynamic field infos of `table`, in the order the ledger yields them.
    pub async fn keys(&self, table: &TableId) -> Result<Vec<DynamicFieldInfo>, BoardError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .ledger
                .get_dynamic_fields(table, cursor.as_deref(), self.page_limit)
                .await
                .map_err(|source| fetch_failed(table, source))?;
            pages += 1;
            out.extend(page.data);

            if !page.has_next_page {
                break;
            }
            match page.next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => {
                    return Err(fetch_failed(
                        table,
                        LedgerError::Rejected("pagination cursor did not advance".to_string()),
                    ));
                }
            }
        }

        debug!(table = %table, pages, entries = out.len(), "walked table keys");
        Ok(out)
    }

    /// All entries of `table` with their child objects resolved.
    pub async fn walk(&self, table: &TableId) -> Result<Vec<TableEntry>, BoardError> {
        let infos = self.keys(table).await?;
        let fetches = infos.into_iter().map(|info| async move {
            let object = self
                .ledger
                .get_dynamic_field_object(table, &info.name)
                .await
                .map_err(|source| fetch_failed(table, source))?
                .ok_or_else(|| {
                    fetch_failed(
                        table,
                        LedgerError::Rejected(format!("entry {} vanished", info.name.value)),
                    )
                })?;
            Ok::<_, BoardError>(TableEntry {
                name: info.name,
                object,
            })
        });
        try_join_all(fetches).await
    }
}

fn fetch_failed(table: &TableId, source: LedgerError) -> BoardError {
    BoardError::TableFetchFailed {
        table: table.to_string(),
        source,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{Address, ErrorKind};
    use crate::ports::{ObjectOptions, Page};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted ledger: page `i` is served for cursor `"i"` (first page for no cursor).
    #[derive(Default)]
    pub(crate) struct PagedLedger {
        pub pages: Vec<Result<Page<DynamicFieldInfo>, LedgerError>>,
        pub children: HashMap<String, RawObject>,
        pub cursors_seen: Mutex<Vec<Option<String>>>,
    }

    impl PagedLedger {
        pub fn with_pages(keys_per_page: &[&[&str]]) -> Self {
            let mut ledger = Self::default();
            let last = keys_per_page.len().saturating_sub(1);
            for (i, keys) in keys_per_page.iter().enumerate() {
                let data = keys
                    .iter()
                    .map(|k| DynamicFieldInfo {
                        name: DynamicFieldName {
                            type_name: "address".to_string(),
                            value: json!(k),
                        },
                        object_id: format!("0xfield_{k}"),
                        object_type: None,
                    })
                    .collect();
                ledger.pages.push(Ok(Page {
                    data,
                    next_cursor: (i < last).then(|| (i + 1).to_string()),
                    has_next_page: i < last,
                }));
                for k in keys.iter() {
                    ledger.children.insert(
                        k.to_string(),
                        RawObject {
                            object_id: format!("0xfield_{k}"),
                            version: 1,
                            object_type: Some("0x2::dynamic_field::Field<address, u8>".to_string()),
                            owner: None,
                            fields: json!({ "name": k, "value": 1 }).as_object().cloned(),
                        },
                    );
                }
            }
            ledger
        }
    }

    #[async_trait]
    impl LedgerReader for PagedLedger {
        async fn get_object(
            &self,
            _id: &str,
            _options: ObjectOptions,
        ) -> Result<Option<RawObject>, LedgerError> {
            Ok(None)
        }

        async fn get_owned_objects(
            &self,
            _owner: &Address,
            _type_filter: &str,
        ) -> Result<Vec<RawObject>, LedgerError> {
            Ok(Vec::new())
        }

        async fn get_dynamic_fields(
            &self,
            _parent: &TableId,
            cursor: Option<&str>,
            _limit: Option<usize>,
        ) -> Result<Page<DynamicFieldInfo>, LedgerError> {
            self.cursors_seen
                .lock()
                .unwrap()
                .push(cursor.map(str::to_string));
            let index = cursor.map_or(0, |c| c.parse::<usize>().unwrap_or(usize::MAX));
            self.pages
                .get(index)
                .cloned()
                .unwrap_or_else(|| Err(LedgerError::Transport(format!("no page {index}"))))
        }

        async fn get_dynamic_field_object(
            &self,
            _parent: &TableId,
            name: &DynamicFieldName,
        ) -> Result<Option<RawObject>, LedgerError> {
            let key = name.value.as_str().unwrap_or_default();
            Ok(self.children.get(key).cloned())
        }
    }

    fn walker(ledger: PagedLedger) -> (TableWalker, Arc<PagedLedger>) {
        let ledger = Arc::new(ledger);
        (TableWalker::new(ledger.clone(), Some(2)), ledger)
    }

    #[tokio::test]
    async fn three_pages_concatenate_in_ledger_order() {
        let (walker, ledger) = walker(PagedLedger::with_pages(&[
            &["0xc", "0xa"],
            &["0xb", "0xe"],
            &["0xd"],
        ]));

        let entries = walker.walk(&TableId::new("0xtable")).await.unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key().clone()).collect();

        assert_eq!(keys, vec![json!("0xc"), json!("0xa"), json!("0xb"), json!("0xe"), json!("0xd")]);
        assert_eq!(entries[0].value(), Some(&json!(1)));
        assert_eq!(
            *ledger.cursors_seen.lock().unwrap(),
            vec![None, Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[tokio::test]
    async fn failing_middle_page_fails_the_walk() {
        let mut ledger = PagedLedger::with_pages(&[&["0xa"], &["0xb"], &["0xc"]]);
        ledger.pages[1] = Err(LedgerError::Transport("page 2 timed out".to_string()));
        let (walker, _) = walker(ledger);

        let err = walker.walk(&TableId::new("0xtable")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TableFetchFailed);
        assert!(err.to_string().contains("0xtable"));
    }

    #[tokio::test]
    async fn missing_child_fails_the_walk() {
        let mut ledger = PagedLedger::with_pages(&[&["0xa", "0xb"]]);
        ledger.children.remove("0xb");
        let (walker, _) = walker(ledger);

        let err = walker.walk(&TableId::new("0xtable")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TableFetchFailed);
    }

    #[tokio::test]
    async fn stuck_cursor_is_rejected() {
        let mut ledger = PagedLedger::with_pages(&[&["0xa"], &["0xb"]]);
        if let Ok(page) = &mut ledger.pages[1] {
            page.has_next_page = true;
            page.next_cursor = Some("1".to_string());
        }
        let (walker, _) = walker(ledger);

        let err = walker.keys(&TableId::new("0xtable")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TableFetchFailed);
    }

    #[tokio::test]
    async fn empty_table_walks_to_nothing() {
        let (walker, _) = walker(PagedLedger::with_pages(&[&[]]));
        assert!(walker.walk(&TableId::new("0xtable")).await.unwrap().is_empty());
    }
}
