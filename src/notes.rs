//! The notes chain: count, insert, count again over one store connection

use crate::core::{Acquire, BoxedStep, Release, StageFailure, Step};
use crate::execution::{CallingStyle, Chain, CoroutineHalted, SequentialPipeline};
use crate::store::{Note, StoreDriver};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Opens a connection on the driver
pub struct Connect<D> {
    driver: Arc<D>,
}

impl<D> Connect<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl<D: StoreDriver> Acquire for Connect<D> {
    type Handle = D::Connection;

    async fn acquire(&self) -> Result<D::Connection> {
        Ok(self.driver.connect().await?)
    }
}

/// Counts the notes in the driver's collection
pub struct CountNotes<D> {
    driver: Arc<D>,
}

impl<D> CountNotes<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl<D: StoreDriver> Step<D::Connection, Value> for CountNotes<D> {
    fn name(&self) -> &str {
        "count"
    }

    async fn run(&self, conn: &D::Connection, _prior: Option<&Value>) -> Result<Value> {
        let count = self
            .driver
            .count(conn)
            .await
            .with_context(|| format!("counting notes in {}", self.driver.collection()))?;
        debug!("{} holds {} notes", self.driver.collection(), count);
        Ok(json!(count))
    }
}

/// Inserts one note; yields the driver's acknowledgement
pub struct InsertNote<D> {
    driver: Arc<D>,
    note: Note,
}

impl<D> InsertNote<D> {
    pub fn new(driver: Arc<D>, note: Note) -> Self {
        Self { driver, note }
    }
}

#[async_trait]
impl<D: StoreDriver> Step<D::Connection, Value> for InsertNote<D> {
    fn name(&self) -> &str {
        "insert"
    }

    async fn run(&self, conn: &D::Connection, _prior: Option<&Value>) -> Result<Value> {
        let result = self
            .driver
            .insert(conn, &self.note)
            .await
            .with_context(|| format!("inserting into {}", self.driver.collection()))?;
        Ok(serde_json::to_value(result)?)
    }
}

/// Closes the connection
pub struct Close<D> {
    driver: Arc<D>,
}

impl<D> Close<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl<D: StoreDriver> Release<D::Connection> for Close<D> {
    async fn release(&self, conn: D::Connection) -> Result<()> {
        Ok(self.driver.close(conn).await?)
    }
}

/// `[count, insert(note), count]`
pub fn notes_steps<D>(driver: Arc<D>, note: Note) -> Vec<BoxedStep<D::Connection, Value>>
where
    D: StoreDriver + 'static,
{
    vec![
        Box::new(CountNotes::new(driver.clone())),
        Box::new(InsertNote::new(driver.clone(), note)),
        Box::new(CountNotes::new(driver)),
    ]
}

/// Run the notes chain against `driver` using the given calling style
///
/// Every style yields the same outcome for the same driver behaviour:
/// `[count, insert result, count]` or the first failure. Release faults are
/// reported through the pipeline's event handlers.
pub async fn run_notes<D>(
    pipeline: &SequentialPipeline<Value>,
    driver: Arc<D>,
    note: Note,
    style: CallingStyle,
) -> Result<Vec<Value>, StageFailure>
where
    D: StoreDriver + 'static,
{
    debug!("Running notes chain as {}", style);
    let connect = Connect::new(driver.clone());
    let close = Close::new(driver.clone());

    match style {
        CallingStyle::Sequence => {
            let steps = notes_steps(driver, note);
            pipeline.run(&connect, &steps, &close).await.result.into_result()
        }
        CallingStyle::Callback => {
            let steps = notes_steps(driver, note);
            pipeline
                .run_with_callback(&connect, &steps, &close, |outcome| outcome)
                .await
        }
        CallingStyle::Chain => Chain::start(connect)
            .then_step(CountNotes::new(driver.clone()))
            .then_step(InsertNote::new(driver.clone(), note))
            .then_step(CountNotes::new(driver))
            .finally(close)
            .run(pipeline)
            .await
            .result
            .into_result(),
        CallingStyle::Coroutine => {
            let count = CountNotes::new(driver.clone());
            let insert = InsertNote::new(driver, note);
            pipeline
                .run_coroutine(&connect, &close, |co| async move {
                    co.step(&count).await?;
                    co.step(&insert).await?;
                    co.step(&count).await?;
                    Ok::<_, CoroutineHalted>(())
                })
                .await
                .result
                .into_result()
        }
    }
}
