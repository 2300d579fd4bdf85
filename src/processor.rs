//! Push/pull processor contract and the filter processor.
//!
//! A scheduler repeatedly calls [`Processor::prepare`] to move chunks across
//! ports and learn what the processor needs next, then calls
//! [`Processor::work`] whenever `prepare` reported [`Status::Ready`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    chunk::Chunk,
    error::{FilterError, PortError},
    header::Header,
    observability::log_debug,
    transform::FilterTransform,
};

/// What a processor asks of the scheduler after `prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Waiting for the upstream to push a chunk.
    NeedData,
    /// Waiting for the downstream to pull the pending output.
    PortFull,
    /// `work` can be called.
    Ready,
    /// Nothing more will be produced.
    Finished,
}

#[derive(Debug, Default)]
struct PortState {
    data: Option<Chunk>,
    needed: bool,
    finished: bool,
    closed: bool,
}

type SharedPort = Arc<Mutex<PortState>>;

/// Create a connected pair of ports carrying chunks shaped like `header`.
pub fn connect(header: Header) -> (OutputPort, InputPort) {
    let state = SharedPort::default();
    (
        OutputPort {
            header: header.clone(),
            state: state.clone(),
        },
        InputPort { header, state },
    )
}

/// Receiving end of a port.
#[derive(Debug)]
pub struct InputPort {
    header: Header,
    state: SharedPort,
}

impl InputPort {
    /// Header of chunks arriving on this port.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Whether a chunk is waiting to be pulled.
    pub fn has_data(&self) -> bool {
        self.state.lock().data.is_some()
    }

    /// Take the waiting chunk.
    pub fn pull(&mut self) -> Result<Chunk, PortError> {
        self.state.lock().data.take().ok_or(PortError::Empty)
    }

    /// Ask the upstream for more data.
    pub fn set_needed(&mut self) {
        self.state.lock().needed = true;
    }

    /// Tell the upstream no data is wanted right now.
    pub fn set_not_needed(&mut self) {
        self.state.lock().needed = false;
    }

    /// Whether no chunk will ever arrive again.
    pub fn is_finished(&self) -> bool {
        let state = self.state.lock();
        state.closed || (state.finished && state.data.is_none())
    }

    /// Stop receiving. Pending data is dropped and the upstream sees a finished port.
    pub fn close(&mut self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.needed = false;
        state.data = None;
    }
}

/// Sending end of a port.
#[derive(Debug)]
pub struct OutputPort {
    header: Header,
    state: SharedPort,
}

impl OutputPort {
    /// Header of chunks sent on this port.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Whether the downstream asked for data and the previous chunk was pulled.
    pub fn can_push(&self) -> bool {
        let state = self.state.lock();
        state.needed && !state.closed && !state.finished && state.data.is_none()
    }

    /// Whether the downstream asked for data.
    pub fn is_needed(&self) -> bool {
        let state = self.state.lock();
        state.needed && !state.closed
    }

    /// Hand `chunk` to the downstream.
    pub fn push(&mut self, chunk: Chunk) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.closed || state.finished {
            return Err(PortError::Finished);
        }
        if state.data.is_some() {
            return Err(PortError::Full);
        }
        state.data = Some(chunk);
        Ok(())
    }

    /// Signal that nothing more will be pushed.
    pub fn finish(&mut self) {
        self.state.lock().finished = true;
    }

    /// Whether the downstream stopped receiving or the port was finished.
    pub fn is_finished(&self) -> bool {
        let state = self.state.lock();
        state.closed || state.finished
    }
}

/// Unit of work driven by a scheduler.
pub trait Processor: Send {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Move data across ports and report what is needed next. Must not block.
    fn prepare(&mut self) -> Status;

    /// Do the actual computation. Called only after `prepare` returned [`Status::Ready`].
    fn work(&mut self) -> Result<(), FilterError>;
}

/// One-chunk-in, at-most-one-chunk-out computation.
pub trait Transform: Send {
    /// Transform `chunk`. `None` drops it.
    fn transform(&mut self, chunk: Chunk) -> Result<Option<Chunk>, FilterError>;
}

impl Transform for FilterTransform {
    fn transform(&mut self, chunk: Chunk) -> Result<Option<Chunk>, FilterError> {
        FilterTransform::transform(self, chunk)
    }
}

/// Processor running a [`Transform`] between one input and one output port.
#[derive(Debug)]
pub struct SimpleTransform<T> {
    transform: T,
    input: InputPort,
    output: OutputPort,
    input_chunk: Option<Chunk>,
    output_chunk: Option<Chunk>,
    port_error: Option<PortError>,
}

impl<T: Transform> SimpleTransform<T> {
    /// Run `transform` from `input` to `output`.
    pub fn new(transform: T, input: InputPort, output: OutputPort) -> Self {
        Self {
            transform,
            input,
            output,
            input_chunk: None,
            output_chunk: None,
            port_error: None,
        }
    }

    /// The wrapped transform.
    pub fn transform(&self) -> &T {
        &self.transform
    }
}

impl<T: Transform> Processor for SimpleTransform<T> {
    fn name(&self) -> &'static str {
        "SimpleTransform"
    }

    fn prepare(&mut self) -> Status {
        if self.port_error.is_some() {
            return Status::Ready;
        }
        if self.output.is_finished() {
            self.input.close();
            return Status::Finished;
        }
        if !self.output.can_push() {
            self.input.set_not_needed();
            return Status::PortFull;
        }
        if let Some(chunk) = self.output_chunk.take() {
            // A refused push is reported by the next `work`.
            if let Err(err) = self.output.push(chunk) {
                self.port_error = Some(err);
                return Status::Ready;
            }
            return Status::PortFull;
        }
        if self.input_chunk.is_some() {
            return Status::Ready;
        }
        if self.input.is_finished() {
            self.output.finish();
            return Status::Finished;
        }
        self.input.set_needed();
        match self.input.pull() {
            Ok(chunk) => {
                self.input_chunk = Some(chunk);
                Status::Ready
            }
            Err(_) => Status::NeedData,
        }
    }

    fn work(&mut self) -> Result<(), FilterError> {
        if let Some(err) = self.port_error.take() {
            return Err(err.into());
        }
        let chunk = self.input_chunk.take().ok_or(PortError::Empty)?;
        self.output_chunk = self
            .transform
            .transform(chunk)?
            .filter(Chunk::has_rows);
        Ok(())
    }
}

/// [`FilterTransform`] as a processor.
///
/// Finishes without reading input when the predicate is known to be false,
/// either from the header or from the expression's prepared sets.
#[derive(Debug)]
pub struct FilterProcessor {
    inner: SimpleTransform<FilterTransform>,
    prepared_sets_initialized: bool,
}

impl FilterProcessor {
    /// Filter chunks from `input` into `output`.
    pub fn new(transform: FilterTransform, input: InputPort, output: OutputPort) -> Self {
        Self {
            inner: SimpleTransform::new(transform, input, output),
            prepared_sets_initialized: false,
        }
    }

    /// Connect a new processor after `input`, returning it with the input port
    /// of its downstream.
    pub fn attach(transform: FilterTransform, input: InputPort) -> (Self, InputPort) {
        let (output, downstream) = connect(transform.output_header().clone());
        (Self::new(transform, input, output), downstream)
    }

    /// The wrapped transform.
    pub fn transform(&self) -> &FilterTransform {
        self.inner.transform()
    }
}

impl Processor for FilterProcessor {
    fn name(&self) -> &'static str {
        "FilterTransform"
    }

    fn prepare(&mut self) -> Status {
        let transform = self.inner.transform();
        if transform.is_always_false()
            || (!self.prepared_sets_initialized && transform.is_proven_false_by_expression())
        {
            log_debug!(
                component = "processor",
                event = "filter_short_circuit",
                filter_column = %transform.filter_column(),
            );
            self.inner.input.close();
            self.inner.output.finish();
            return Status::Finished;
        }

        let status = self.inner.prepare();
        // Until prepared sets exist the downstream does not pull, so prepare keeps reporting PortFull.
        if status != Status::PortFull {
            self.prepared_sets_initialized = true;
        }
        status
    }

    fn work(&mut self) -> Result<(), FilterError> {
        self.inner.work()
    }
}
