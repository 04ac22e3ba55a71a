use crate::domain::model::{
    ApiToken, Brand, CaseStudy, ContactMessage, Inquiry, NewsletterSubscriber, Post, Service,
    Testimonial, User,
};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const SNAPSHOT_FILE: &str = "store.json";

/// 以自動遞增 id 存放的資料表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    next_id: u64,
    items: BTreeMap<u64, T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            items: BTreeMap::new(),
        }
    }
}

impl<T> Collection<T> {
    /// 由 `build` 依新 id 建立資料並插入
    pub fn insert_with(&mut self, build: impl FnOnce(u64) -> T) -> &T {
        let id = self.next_id;
        self.next_id += 1;
        self.items.entry(id).or_insert(build(id))
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<T> {
        self.items.remove(&id)
    }

    pub fn retain(&mut self, keep: impl FnMut(&u64, &mut T) -> bool) {
        self.items.retain(keep);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut()
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<&T> {
        self.items.values().find(|item| predicate(item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreData {
    pub services: Collection<Service>,
    pub case_studies: Collection<CaseStudy>,
    pub posts: Collection<Post>,
    pub testimonials: Collection<Testimonial>,
    pub brands: Collection<Brand>,
    pub contacts: Collection<ContactMessage>,
    pub subscribers: Collection<NewsletterSubscriber>,
    pub inquiries: Collection<Inquiry>,
    pub users: Collection<User>,
    pub tokens: Collection<ApiToken>,
}

/// 全部資料放在記憶體，寫入時透過 `Storage` 保存 JSON 快照
pub struct Store {
    data: RwLock<StoreData>,
    storage: Option<Arc<dyn Storage>>,
    /// 與 store 同生命週期的資源，例如資料目錄鎖
    _guard: Option<Box<dyn Send + Sync>>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            storage: None,
            _guard: None,
        }
    }

    /// 開啟持久化的 store，若快照存在則載入
    pub async fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        let data = match storage.read_file(SNAPSHOT_FILE).await? {
            Some(bytes) => {
                let data: StoreData = serde_json::from_slice(&bytes)?;
                tracing::info!(
                    "📂 Loaded snapshot: {} posts, {} services, {} users",
                    data.posts.len(),
                    data.services.len(),
                    data.users.len()
                );
                data
            }
            None => {
                tracing::info!("📂 No snapshot found, starting with an empty store");
                StoreData::default()
            }
        };

        Ok(Self {
            data: RwLock::new(data),
            storage: Some(storage),
            _guard: None,
        })
    }

    /// 讓 store 持有 `guard` 直到自身被釋放
    pub fn holding(mut self, guard: impl Send + Sync + 'static) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }

    pub async fn read<R>(&self, f: impl FnOnce(&StoreData) -> R) -> R {
        let guard = self.data.read().await;
        f(&guard)
    }

    /// 在寫鎖內對資料副本執行修改，快照寫入成功後才換上新資料
    ///
    /// `f` 或快照寫入失敗時，記憶體中的資料維持原狀。
    pub async fn write<R>(&self, f: impl FnOnce(&mut StoreData) -> Result<R>) -> Result<R> {
        let mut guard = self.data.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;

        if let Some(storage) = &self.storage {
            let bytes = serde_json::to_vec_pretty(&next)?;
            if let Err(e) = storage.write_file(SNAPSHOT_FILE, &bytes).await {
                tracing::error!("❌ Snapshot write failed, change discarded: {}", e);
                return Err(e);
            }
            tracing::debug!("💾 Snapshot saved ({} bytes)", bytes.len());
        }

        *guard = next;
        Ok(out)
    }
}

/// 將標題轉為 URL slug (僅保留 ASCII 英數字)
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

/// 若 slug 已被使用則依序加上 `-2`、`-3`…
pub fn unique_slug(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
