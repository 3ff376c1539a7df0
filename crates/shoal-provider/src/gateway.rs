//! The compute-provider contract the reconciliation engine depends on.

use async_trait::async_trait;

use shoal_core::Instance;

use crate::error::ProviderResult;

/// Everything a provider needs to boot one instance of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTemplate {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image_id: String,
    /// User tags plus the group's membership tag.
    pub tags: Vec<String>,
    pub ssh_keys: Vec<u64>,
    pub private_networking: bool,
    pub monitoring: bool,
    pub user_data: Option<String>,
}

/// One page of a paginated listing (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub per_page: u32,
}

impl Page {
    pub fn first(per_page: u32) -> Self {
        Self {
            number: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn next(self) -> Self {
        Self {
            number: self.number + 1,
            ..self
        }
    }

    /// Cut this page out of a full result set and work out whether another
    /// page follows.
    pub fn slice<T>(self, mut items: Vec<T>) -> (Vec<T>, Option<Page>) {
        let per_page = self.per_page.max(1) as usize;
        let start = (self.number.max(1) as usize - 1) * per_page;
        if start >= items.len() {
            return (Vec::new(), None);
        }
        let end = (start + per_page).min(items.len());
        let more = end < items.len();
        items.truncate(end);
        let page = items.split_off(start);
        (page, more.then(|| self.next()))
    }
}

/// A page of instances plus the page to request next, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePage {
    pub instances: Vec<Instance>,
    pub next: Option<Page>,
}

/// A cloud compute API, reduced to what scaling groups need.
///
/// Every method is a suspension point. Callers cancel an in-flight call by
/// dropping its future.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    async fn create_instance(&self, template: &InstanceTemplate) -> ProviderResult<Instance>;

    async fn delete_instance(&self, id: &str) -> ProviderResult<()>;

    async fn list_instances_by_tag(&self, tag: &str, page: Page) -> ProviderResult<InstancePage>;

    /// Resolve a snapshot name to the provider's image id.
    async fn find_snapshot_by_name(&self, name: &str) -> ProviderResult<String>;

    /// List every instance carrying `tag`, following pagination to the end.
    async fn list_all_by_tag(&self, tag: &str, per_page: u32) -> ProviderResult<Vec<Instance>> {
        let mut page = Page::first(per_page);
        let mut all = Vec::new();
        loop {
            let batch = self.list_instances_by_tag(tag, page).await?;
            all.extend(batch.instances);
            match batch.next {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(all)
    }
}
