use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

use crate::api::FileApi;
use crate::domain::{Message, RtvError};
use crate::filter::FilterStore;

/// Issues gateway calls as background tasks and posts their results
/// back on the event channel. Table fetches carry a monotonic
/// sequence number; [`Fetcher::accept`] admits a response only if it
/// is newer than anything applied so far, so overlapping fetches
/// (rapid page clicks) can never regress the view to an older page.
/// The loading flag stays up until the newest issued request has
/// answered.
pub struct Fetcher {
    api: Arc<dyn FileApi>,
    events: UnboundedSender<Message>,
    issued: u64,
    applied: u64,
    loading: bool,
}

impl Fetcher {
    pub fn new(api: Arc<dyn FileApi>, events: UnboundedSender<Message>) -> Self {
        Self {
            api,
            events,
            issued: 0,
            applied: 0,
            loading: false,
        }
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Fetch the file listing. Completion arrives as
    /// [`Message::FilesFetched`].
    pub fn request_listing(&self) {
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api.list_files().await;
            let _ = events.send(Message::FilesFetched(result));
        });
    }

    /// Fetch one page of one file. A no-op while the file id is still
    /// unresolved (it arrives asynchronously from the listing).
    /// Completion arrives as [`Message::TableFetched`].
    pub fn request_table(&mut self, id: &str, page: u32, page_size: u32, filters: &FilterStore) {
        if id.is_empty() {
            trace!("No file id yet, skipping fetch");
            return;
        }
        self.issued += 1;
        let seq = self.issued;
        self.loading = true;
        debug!("Fetch #{seq}: id={id} page={page} page_size={page_size}");

        let api = self.api.clone();
        let events = self.events.clone();
        let id = id.to_string();
        let filters = filters.clone();
        tokio::spawn(async move {
            let result = api.fetch_table(&id, page, page_size, &filters).await;
            let _ = events.send(Message::TableFetched { seq, result });
        });
    }

    /// Decide whether a table response may be applied. Stale
    /// responses (an earlier request arriving after a later one) are
    /// dropped wholesale, errors included. The loading flag clears
    /// once the newest issued request has been answered.
    pub fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            debug!("Dropping stale fetch #{seq} (applied #{})", self.applied);
            return false;
        }
        self.applied = seq;
        if seq == self.issued {
            self.loading = false;
        }
        true
    }

    /// Read and transfer a validated candidate. Completion arrives as
    /// [`Message::UploadFinished`]; a read error surfaces through the
    /// same path so the candidate is retained for retry.
    pub fn start_upload(&self, path: PathBuf, file_name: String) {
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = match tokio::fs::read(&path).await {
                Ok(bytes) => api.upload(&file_name, bytes).await,
                Err(e) => Err(RtvError::from(e)),
            };
            let _ = events.send(Message::UploadFinished(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    use crate::table::{FileEntry, FileTable, PageMeta};

    /// In-memory gateway: answers from canned tables and records the
    /// calls it saw.
    struct FakeApi {
        tables: Mutex<Vec<Result<FileTable, RtvError>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn with_tables(tables: Vec<Result<FileTable, RtvError>>) -> Arc<Self> {
            Arc::new(Self {
                tables: Mutex::new(tables),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl FileApi for FakeApi {
        async fn list_files(&self) -> Result<Vec<FileEntry>, RtvError> {
            Ok(vec![FileEntry {
                id: "7".to_string(),
                file_name: "sales.csv".to_string(),
                url: "/files/7".to_string(),
            }])
        }

        async fn fetch_table(
            &self,
            id: &str,
            page: u32,
            page_size: u32,
            filters: &FilterStore,
        ) -> Result<FileTable, RtvError> {
            self.calls.lock().unwrap().push(format!(
                "{id}:{page}:{page_size}:{}",
                filters.to_query_json()
            ));
            self.tables.lock().unwrap().remove(0)
        }

        async fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> Result<FileEntry, RtvError> {
            Ok(FileEntry {
                id: "42".to_string(),
                file_name: file_name.to_string(),
                url: "/files/42".to_string(),
            })
        }
    }

    fn table_for_page(page: u32) -> FileTable {
        FileTable {
            headers: vec!["a".to_string()],
            data: Vec::new(),
            meta: PageMeta {
                page,
                page_size: 10,
                total_records: 30,
                total_pages: 3,
            },
        }
    }

    #[tokio::test]
    async fn empty_id_issues_no_request() {
        let api = FakeApi::with_tables(Vec::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut fetcher = Fetcher::new(api.clone(), tx);

        fetcher.request_table("", 1, 10, &FilterStore::default());
        assert!(!fetcher.loading());
        assert!(rx.try_recv().is_err());
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn responses_carry_their_sequence() {
        let api = FakeApi::with_tables(vec![Ok(table_for_page(1))]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut fetcher = Fetcher::new(api, tx);

        fetcher.request_table("7", 1, 10, &FilterStore::default());
        assert!(fetcher.loading());

        let msg = rx.recv().await.unwrap();
        match msg {
            Message::TableFetched { seq, result } => {
                assert_eq!(seq, 1);
                assert_eq!(result.unwrap().meta.page, 1);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_response_is_discarded() {
        let api = FakeApi::with_tables(vec![Ok(table_for_page(2)), Ok(table_for_page(3))]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut fetcher = Fetcher::new(api, tx);

        // Two overlapping fetches: A (seq 1) then B (seq 2).
        fetcher.request_table("7", 2, 10, &FilterStore::default());
        fetcher.request_table("7", 3, 10, &FilterStore::default());

        // B's response arrives first and is applied; A's late arrival
        // must be dropped, not applied last-arrival-wins.
        assert!(fetcher.accept(2));
        assert!(!fetcher.loading());
        assert!(!fetcher.accept(1));
    }

    #[tokio::test]
    async fn loading_stays_up_until_newest_answers() {
        let api = FakeApi::with_tables(vec![Ok(table_for_page(1)), Ok(table_for_page(2))]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut fetcher = Fetcher::new(api, tx);

        fetcher.request_table("7", 1, 10, &FilterStore::default());
        fetcher.request_table("7", 2, 10, &FilterStore::default());

        // The older response answers first; a newer one is still out.
        assert!(fetcher.accept(1));
        assert!(fetcher.loading());
        assert!(fetcher.accept(2));
        assert!(!fetcher.loading());
    }

    #[tokio::test]
    async fn failed_fetch_still_clears_loading() {
        let api = FakeApi::with_tables(vec![Err(RtvError::NoData("empty".to_string()))]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut fetcher = Fetcher::new(api, tx);

        fetcher.request_table("7", 1, 10, &FilterStore::default());
        let msg = rx.recv().await.unwrap();
        let Message::TableFetched { seq, result } = msg else {
            panic!("unexpected message");
        };
        assert!(result.is_err());
        assert!(fetcher.accept(seq));
        assert!(!fetcher.loading());
    }

    #[tokio::test]
    async fn upload_posts_the_new_entry() {
        let api = FakeApi::with_tables(Vec::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let fetcher = Fetcher::new(api, tx);

        let tmp = std::env::temp_dir().join("rtv-upload-test.csv");
        std::fs::write(&tmp, b"a,b\n1,2\n").unwrap();
        fetcher.start_upload(tmp.clone(), "sales.csv".to_string());

        let msg = rx.recv().await.unwrap();
        let Message::UploadFinished(result) = msg else {
            panic!("unexpected message");
        };
        let entry = result.unwrap();
        assert_eq!(entry.id, "42");
        assert_eq!(entry.file_name, "sales.csv");
        let _ = std::fs::remove_file(tmp);
    }

    #[tokio::test]
    async fn unreadable_path_fails_the_upload() {
        let api = FakeApi::with_tables(Vec::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let fetcher = Fetcher::new(api, tx);

        fetcher.start_upload(PathBuf::from("/nonexistent/rtv.csv"), "rtv.csv".to_string());
        let Message::UploadFinished(result) = rx.recv().await.unwrap() else {
            panic!("unexpected message");
        };
        assert!(matches!(result, Err(RtvError::IoError(_))));
    }
}
