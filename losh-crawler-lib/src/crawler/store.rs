use crate::Result;
use crate::models::{Host, License, Product};
use crate::net::CallContext;
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use core::fmt::Debug;
use ohno::IntoAppError;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use std::sync::Mutex;

const LOG_TARGET: &str = "     store";

/// Destination of crawled data.
#[async_trait]
pub trait ProductStore: Debug + Send + Sync {
    async fn save_product(&self, ctx: &CallContext, product: Product) -> Result<()>;

    async fn save_licenses(&self, ctx: &CallContext, licenses: Vec<License>) -> Result<()>;

    async fn save_hosts(&self, ctx: &CallContext, hosts: Vec<Host>) -> Result<()>;

    /// Whether the store can currently accept writes.
    async fn is_reachable(&self, ctx: &CallContext) -> bool;
}

/// Writes everything as pretty-printed JSON documents below a directory.
///
/// Each product lands in `products/<escaped xid>.json`, replacing any earlier
/// version; licenses and hosts are written to `licenses.json` and `hosts.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: Utf8PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Where the product with the given xid is stored.
    #[must_use]
    pub fn product_path(&self, xid: &str) -> Utf8PathBuf {
        self.root.join("products").join(format!("{}.json", utf8_percent_encode(xid, NON_ALPHANUMERIC)))
    }

    async fn write_json<T: Serialize + Sync>(&self, ctx: &CallContext, path: &Utf8Path, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value).into_app_err_with(|| format!("serializing '{path}'"))?;

        if let Some(parent) = path.parent() {
            ctx.run(tokio::fs::create_dir_all(parent))
                .await?
                .into_app_err_with(|| format!("creating directory '{parent}'"))?;
        }

        // write next to the target first so readers never see a partial document
        let tmp = path.with_extension("json.tmp");
        let result: Result<()> = async {
            ctx.run(tokio::fs::write(&tmp, json)).await?.into_app_err_with(|| format!("writing '{tmp}'"))?;
            tokio::fs::rename(&tmp, path)
                .await
                .into_app_err_with(|| format!("renaming '{tmp}' to '{path}'"))
        }
        .await;

        if result.is_err()
            && let Err(e) = tokio::fs::remove_file(&tmp).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!(target: LOG_TARGET, "unable to remove '{tmp}': {e}");
        }
        result?;

        log::debug!(target: LOG_TARGET, "wrote {path}");
        Ok(())
    }
}

#[async_trait]
impl ProductStore for JsonFileStore {
    async fn save_product(&self, ctx: &CallContext, product: Product) -> Result<()> {
        let path = self.product_path(&product.xid);
        self.write_json(ctx, &path, &product).await
    }

    async fn save_licenses(&self, ctx: &CallContext, licenses: Vec<License>) -> Result<()> {
        self.write_json(ctx, &self.root.join("licenses.json"), &licenses).await
    }

    async fn save_hosts(&self, ctx: &CallContext, hosts: Vec<Host>) -> Result<()> {
        self.write_json(ctx, &self.root.join("hosts.json"), &hosts).await
    }

    async fn is_reachable(&self, _ctx: &CallContext) -> bool {
        if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
            log::warn!(target: LOG_TARGET, "store directory '{}' is not usable: {e}", self.root);
            return false;
        }
        true
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: Mutex<Vec<Product>>,
    licenses: Mutex<Vec<License>>,
    hosts: Mutex<Vec<Host>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The saved products, in the order they were saved.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.products.lock().expect("lock not poisoned").clone()
    }

    #[must_use]
    pub fn licenses(&self) -> Vec<License> {
        self.licenses.lock().expect("lock not poisoned").clone()
    }

    #[must_use]
    pub fn hosts(&self) -> Vec<Host> {
        self.hosts.lock().expect("lock not poisoned").clone()
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn save_product(&self, ctx: &CallContext, product: Product) -> Result<()> {
        ctx.check()?;
        let mut products = self.products.lock().expect("lock not poisoned");
        products.retain(|p| p.xid != product.xid);
        products.push(product);
        Ok(())
    }

    async fn save_licenses(&self, ctx: &CallContext, licenses: Vec<License>) -> Result<()> {
        ctx.check()?;
        *self.licenses.lock().expect("lock not poisoned") = licenses;
        Ok(())
    }

    async fn save_hosts(&self, ctx: &CallContext, hosts: Vec<Host>) -> Result<()> {
        ctx.check()?;
        let mut known = self.hosts.lock().expect("lock not poisoned");
        for host in hosts {
            if !known.contains(&host) {
                known.push(host);
            }
        }
        Ok(())
    }

    async fn is_reachable(&self, _ctx: &CallContext) -> bool {
        true
    }
}
