//! Warehouse catalog.
//!
//! Table ids `project.dataset.table` map onto DataFusion's
//! `catalog.schema.table` references. Catalogs and schemas are created on
//! first lookup; a table resolves to whatever was registered in the session
//! under that name, or else to the Delta table stored at
//! `<root>/<project>/<dataset>/<table>`.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use datafusion::catalog::{
    CatalogProvider, CatalogProviderList, MemoryCatalogProviderList, SchemaProvider,
    TableProvider,
};
use datafusion_common::{exec_err, DataFusionError, Result};
use deltalake::delta_datafusion::{DeltaScanConfig, DeltaTableProvider};
use deltalake::errors::DeltaTableError;
use deltalake::{ensure_table_uri, DeltaTable, DeltaTableBuilder};
use tracing::debug;
use url::Url;

use crate::spec::dataset::TableId;

/// Location and credentials of the Delta warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warehouse {
    root: String,
    storage_options: HashMap<String, String>,
}

impl Warehouse {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            storage_options: HashMap::new(),
        }
    }

    pub fn with_storage_options(mut self, options: &BTreeMap<String, String>) -> Self {
        self.storage_options
            .extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn storage_options(&self) -> &HashMap<String, String> {
        &self.storage_options
    }

    pub fn table_location(&self, table: &TableId) -> String {
        format!(
            "{}/{}/{}/{}",
            self.root.trim_end_matches('/'),
            table.project,
            table.dataset,
            table.table
        )
    }

    /// Directory backing `table` when the warehouse is on the local file system.
    fn local_dir(&self, table: &TableId) -> Option<PathBuf> {
        let location = self.table_location(table);
        match Url::parse(&location) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
            Ok(_) => None,
            Err(_) => Some(PathBuf::from(location)),
        }
    }

    fn builder(&self, table: &TableId) -> Result<DeltaTableBuilder, DeltaTableError> {
        let url = ensure_table_uri(self.table_location(table))?;
        Ok(DeltaTableBuilder::from_url(url)?.with_storage_options(self.storage_options.clone()))
    }

    /// Open a table handle; the flag is false when nothing is stored at the
    /// location yet.
    async fn open(
        &self,
        table: &TableId,
        version: Option<i64>,
    ) -> Result<(DeltaTable, bool), DeltaTableError> {
        let mut builder = self.builder(table)?;
        if let Some(version) = version {
            builder = builder.with_version(version);
        }
        let mut handle = builder.build()?;
        match handle.load().await {
            Ok(()) => Ok((handle, true)),
            Err(DeltaTableError::NotATable(_)) => Ok((handle, false)),
            Err(err) => Err(err),
        }
    }

    /// Load a table, or `None` when nothing is stored at its location.
    /// Never creates anything in the warehouse.
    pub async fn load_table(
        &self,
        table: &TableId,
        version: Option<i64>,
    ) -> Result<Option<DeltaTable>, DeltaTableError> {
        if self.local_dir(table).is_some_and(|dir| !dir.exists()) {
            return Ok(None);
        }
        let (handle, exists) = self.open(table, version).await?;
        Ok(exists.then_some(handle))
    }

    /// Handle for writing a table that may not exist yet. Local table
    /// directories are created here.
    pub async fn table_for_write(&self, table: &TableId) -> Result<DeltaTable, DeltaTableError> {
        if let Some(dir) = self.local_dir(table) {
            tokio::fs::create_dir_all(&dir).await.map_err(|err| {
                DeltaTableError::InvalidTableLocation(format!("{}: {err}", dir.display()))
            })?;
        }
        Ok(self.open(table, None).await?.0)
    }

    pub async fn table_exists(&self, table: &TableId) -> Result<bool, DeltaTableError> {
        Ok(self.load_table(table, None).await?.is_some())
    }

    /// DataFusion provider over a stored table.
    pub async fn table_provider(
        &self,
        table: &TableId,
        version: Option<i64>,
    ) -> Result<Option<Arc<dyn TableProvider>>> {
        let Some(loaded) = self
            .load_table(table, version)
            .await
            .map_err(|err| DataFusionError::External(Box::new(err)))?
        else {
            return Ok(None);
        };
        let snapshot = loaded
            .snapshot()
            .map_err(|err| DataFusionError::External(Box::new(err)))?;
        debug!(table = %table, version = snapshot.version(), "Opened warehouse table");
        let eager_snapshot = snapshot.snapshot().clone();
        let provider =
            DeltaTableProvider::try_new(eager_snapshot, loaded.log_store(), DeltaScanConfig::default())
                .map_err(|err| DataFusionError::External(Box::new(err)))?;
        Ok(Some(Arc::new(provider)))
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Catalog list resolving unknown catalogs as warehouse projects.
pub struct WarehouseCatalogList {
    registered: MemoryCatalogProviderList,
    warehouse: Arc<Warehouse>,
    projects: RwLock<BTreeMap<String, Arc<WarehouseCatalog>>>,
}

impl WarehouseCatalogList {
    pub fn new(warehouse: Arc<Warehouse>) -> Self {
        Self {
            registered: MemoryCatalogProviderList::new(),
            warehouse,
            projects: RwLock::new(BTreeMap::new()),
        }
    }

    fn project(&self, name: &str) -> Arc<WarehouseCatalog> {
        if let Some(existing) = read(&self.projects).get(name) {
            return Arc::clone(existing);
        }
        let mut projects = write(&self.projects);
        Arc::clone(projects.entry(name.to_string()).or_insert_with(|| {
            Arc::new(WarehouseCatalog::new(name, Arc::clone(&self.warehouse)))
        }))
    }
}

impl fmt::Debug for WarehouseCatalogList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseCatalogList")
            .field("root", &self.warehouse.root)
            .field("projects", &read(&self.projects).keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl CatalogProviderList for WarehouseCatalogList {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn register_catalog(
        &self,
        name: String,
        catalog: Arc<dyn CatalogProvider>,
    ) -> Option<Arc<dyn CatalogProvider>> {
        self.registered.register_catalog(name, catalog)
    }

    fn catalog_names(&self) -> Vec<String> {
        let mut names = self.registered.catalog_names();
        for name in read(&self.projects).keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    fn catalog(&self, name: &str) -> Option<Arc<dyn CatalogProvider>> {
        self.registered
            .catalog(name)
            .or_else(|| Some(self.project(name) as Arc<dyn CatalogProvider>))
    }
}

/// One warehouse project.
pub struct WarehouseCatalog {
    project: String,
    warehouse: Arc<Warehouse>,
    schemas: RwLock<BTreeMap<String, Arc<dyn SchemaProvider>>>,
}

impl WarehouseCatalog {
    pub fn new(project: impl Into<String>, warehouse: Arc<Warehouse>) -> Self {
        Self {
            project: project.into(),
            warehouse,
            schemas: RwLock::new(BTreeMap::new()),
        }
    }
}

impl fmt::Debug for WarehouseCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseCatalog")
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl CatalogProvider for WarehouseCatalog {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema_names(&self) -> Vec<String> {
        read(&self.schemas).keys().cloned().collect()
    }

    fn schema(&self, name: &str) -> Option<Arc<dyn SchemaProvider>> {
        if let Some(existing) = read(&self.schemas).get(name) {
            return Some(Arc::clone(existing));
        }
        let mut schemas = write(&self.schemas);
        let schema = schemas.entry(name.to_string()).or_insert_with(|| {
            Arc::new(WarehouseSchema::new(
                self.project.clone(),
                name,
                Arc::clone(&self.warehouse),
            ))
        });
        Some(Arc::clone(schema))
    }

    fn register_schema(
        &self,
        name: &str,
        schema: Arc<dyn SchemaProvider>,
    ) -> Result<Option<Arc<dyn SchemaProvider>>> {
        Ok(write(&self.schemas).insert(name.to_string(), schema))
    }
}

/// One warehouse dataset.
pub struct WarehouseSchema {
    project: String,
    dataset: String,
    warehouse: Arc<Warehouse>,
    registered: RwLock<HashMap<String, Arc<dyn TableProvider>>>,
}

impl WarehouseSchema {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        warehouse: Arc<Warehouse>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            warehouse,
            registered: RwLock::new(HashMap::new()),
        }
    }
}

impl fmt::Debug for WarehouseSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseSchema")
            .field("project", &self.project)
            .field("dataset", &self.dataset)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SchemaProvider for WarehouseSchema {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.registered).keys().cloned().collect();
        names.sort();
        names
    }

    async fn table(&self, name: &str) -> Result<Option<Arc<dyn TableProvider>>> {
        if let Some(table) = read(&self.registered).get(name) {
            return Ok(Some(Arc::clone(table)));
        }
        let id = TableId::new(self.project.as_str(), self.dataset.as_str(), name);
        self.warehouse.table_provider(&id, None).await
    }

    fn register_table(
        &self,
        name: String,
        table: Arc<dyn TableProvider>,
    ) -> Result<Option<Arc<dyn TableProvider>>> {
        let mut registered = write(&self.registered);
        if registered.contains_key(&name) {
            return exec_err!("The table {name} already exists");
        }
        Ok(registered.insert(name, table))
    }

    fn deregister_table(&self, name: &str) -> Result<Option<Arc<dyn TableProvider>>> {
        Ok(write(&self.registered).remove(name))
    }

    fn table_exist(&self, name: &str) -> bool {
        read(&self.registered).contains_key(name)
    }
}
