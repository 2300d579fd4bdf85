//! Single-threaded driver for a linear chain of processors.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
    chunk::Chunk,
    error::{FilterError, PortError},
    observability::{log_info, log_warn},
    processor::{InputPort, OutputPort, Processor, Status},
};

/// Processor emitting a fixed list of chunks.
#[derive(Debug)]
pub struct ChunkSource {
    chunks: VecDeque<Chunk>,
    pending: Option<Chunk>,
    port_error: Option<PortError>,
    output: OutputPort,
}

impl ChunkSource {
    /// Emit `chunks` in order on `output`, then finish it.
    pub fn new(chunks: impl IntoIterator<Item = Chunk>, output: OutputPort) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
            pending: None,
            port_error: None,
            output,
        }
    }
}

impl Processor for ChunkSource {
    fn name(&self) -> &'static str {
        "ChunkSource"
    }

    fn prepare(&mut self) -> Status {
        if self.port_error.is_some() {
            return Status::Ready;
        }
        if self.output.is_finished() {
            return Status::Finished;
        }
        if self.pending.is_none() && self.chunks.is_empty() {
            self.output.finish();
            return Status::Finished;
        }
        if !self.output.can_push() {
            return Status::PortFull;
        }
        match self.pending.take() {
            Some(chunk) => {
                // A refused push is reported by the next `work`.
                if let Err(err) = self.output.push(chunk) {
                    self.port_error = Some(err);
                    return Status::Ready;
                }
                Status::PortFull
            }
            None => Status::Ready,
        }
    }

    fn work(&mut self) -> Result<(), FilterError> {
        if let Some(err) = self.port_error.take() {
            return Err(err.into());
        }
        self.pending = self.chunks.pop_front();
        Ok(())
    }
}

/// Chunks gathered by a [`CollectSink`], readable after the pipeline ran.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    chunks: Arc<Mutex<Vec<Chunk>>>,
}

impl Collected {
    /// Take every chunk received so far.
    pub fn take(&self) -> Vec<Chunk> {
        std::mem::take(&mut *self.chunks.lock())
    }

    /// Total rows received so far.
    pub fn num_rows(&self) -> usize {
        self.chunks.lock().iter().map(Chunk::num_rows).sum()
    }
}

/// Processor storing every chunk it receives.
#[derive(Debug)]
pub struct CollectSink {
    input: InputPort,
    current: Option<Chunk>,
    collected: Collected,
}

impl CollectSink {
    /// Collect from `input`.
    pub fn new(input: InputPort) -> Self {
        Self {
            input,
            current: None,
            collected: Collected::default(),
        }
    }

    /// Handle to the gathered chunks.
    pub fn collected(&self) -> Collected {
        self.collected.clone()
    }
}

impl Processor for CollectSink {
    fn name(&self) -> &'static str {
        "CollectSink"
    }

    fn prepare(&mut self) -> Status {
        if self.current.is_some() {
            return Status::Ready;
        }
        if self.input.is_finished() {
            return Status::Finished;
        }
        self.input.set_needed();
        match self.input.pull() {
            Ok(chunk) => {
                self.current = Some(chunk);
                Status::Ready
            }
            Err(_) => Status::NeedData,
        }
    }

    fn work(&mut self) -> Result<(), FilterError> {
        if let Some(chunk) = self.current.take() {
            self.collected.chunks.lock().push(chunk);
        }
        Ok(())
    }
}

/// Linear chain of processors, driven until every one finishes.
#[derive(Default)]
pub struct Pipeline {
    processors: Vec<Box<dyn Processor>>,
}

impl Pipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a processor. Processors are prepared in insertion order, so
    /// add them from source to sink.
    pub fn add(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Number of processors.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether no processor was added.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Drive every processor to completion.
    ///
    /// Fails with [`FilterError::Stalled`] when a full round neither runs
    /// `work` nor changes any status.
    pub fn run(&mut self) -> Result<(), FilterError> {
        let mut previous: Vec<Status> = Vec::new();
        let mut rounds = 0usize;
        loop {
            rounds += 1;
            let mut statuses = Vec::with_capacity(self.processors.len());
            let mut worked = false;
            for processor in &mut self.processors {
                let status = processor.prepare();
                if status == Status::Ready {
                    processor.work()?;
                    worked = true;
                }
                statuses.push(status);
            }

            let unfinished = statuses
                .iter()
                .filter(|status| **status != Status::Finished)
                .count();
            if unfinished == 0 {
                log_info!(
                    component = "pipeline",
                    event = "pipeline_finished",
                    processors = self.processors.len(),
                    rounds,
                );
                return Ok(());
            }
            if !worked && statuses == previous {
                let waiting: Vec<&str> = self
                    .processors
                    .iter()
                    .zip(&statuses)
                    .filter(|(_, status)| **status != Status::Finished)
                    .map(|(processor, _)| processor.name())
                    .collect();
                log_warn!(
                    component = "pipeline",
                    event = "pipeline_stalled",
                    unfinished,
                    waiting = ?waiting,
                );
                return Err(FilterError::Stalled(unfinished));
            }
            previous = statuses;
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.processors.iter().map(|processor| processor.name()))
            .finish()
    }
}
