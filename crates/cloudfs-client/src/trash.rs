//! Trash operations

use crate::client::require_non_empty;
use crate::credential::validate_path;
use crate::response::{expect_items, expect_success};
use crate::{
    ClientError, FormBody, Item, ItemOrigin, Query, ResourceKind, RestAdapter, RestoreMethod,
    Result,
};
use tracing::instrument;

impl RestAdapter {
    /// List trashed items (`None` lists the top of the trash)
    #[instrument(skip(self))]
    pub async fn list_trash(&self, path: Option<&str>) -> Result<Vec<Item>> {
        if let Some(p) = path {
            validate_path(p, "path", 1)?;
        }
        let url = self.credential().build_url(ResourceKind::Trash, path, &Query::new())?;
        let result = self.send_get(url).await?;

        let parent = path.filter(|p| !p.is_empty()).unwrap_or("/");
        self.items_in(expect_items(result)?, parent, ItemOrigin::Trash)
    }

    /// Restore a trashed item.
    ///
    /// `Recreate` needs a destination and sends it as `recreate-path`;
    /// `Rescue` sends `rescue-path` only when a destination is given.
    #[instrument(skip(self))]
    pub async fn restore(
        &self,
        path: &str,
        destination: Option<&str>,
        method: RestoreMethod,
    ) -> Result<bool> {
        require_non_empty(path, "path", 1)?;
        validate_path(path, "path", 1)?;

        let destination = destination.filter(|d| !d.is_empty());
        if let Some(dest) = destination {
            validate_path(dest, "destination", 2)?;
        }

        let mut form = FormBody::new();
        form.set("restore", method.as_str());
        match (method, destination) {
            (RestoreMethod::Recreate, Some(dest)) => {
                form.set("recreate-path", dest);
            }
            (RestoreMethod::Recreate, None) => {
                return Err(ClientError::invalid_argument(
                    "destination",
                    2,
                    "recreate needs a destination",
                ));
            }
            (RestoreMethod::Rescue, Some(dest)) => {
                form.set("rescue-path", dest);
            }
            (RestoreMethod::Rescue, None) | (RestoreMethod::Fail, _) => {}
        }

        let url = self.credential().build_url(ResourceKind::Trash, Some(path), &Query::new())?;
        let result = self.send_form(url, &form).await?;
        expect_success(&result)
    }

    /// [`RestAdapter::restore`] with the method given as its wire string
    pub async fn restore_with(
        &self,
        path: &str,
        destination: Option<&str>,
        method: &str,
    ) -> Result<bool> {
        let method: RestoreMethod = method.parse().map_err(|_| {
            let message = format!("unknown restore method {:?}", method);
            ClientError::invalid_argument("method", 3, message)
        })?;
        self.restore(path, destination, method).await
    }

    /// Permanently delete an item from the trash
    #[instrument(skip(self))]
    pub async fn delete_trash_item(&self, path: &str) -> Result<bool> {
        require_non_empty(path, "path", 1)?;
        validate_path(path, "path", 1)?;
        let url = self.credential().build_url(ResourceKind::Trash, Some(path), &Query::new())?;
        let result = self.send_delete(url).await?;
        expect_success(&result)
    }
}
