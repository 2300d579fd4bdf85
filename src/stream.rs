//! Async adapter applying a [`FilterTransform`] to a stream of chunks.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::Stream;
use futures_util::ready;
use pin_project_lite::pin_project;

use crate::{
    chunk::Chunk,
    error::FilterError,
    header::Header,
    observability::log_debug,
    transform::FilterTransform,
};

pin_project! {
    /// Stream yielding the non-empty filtered chunks of `inner`.
    ///
    /// Ends without polling `inner` when the predicate is statically false.
    pub struct FilterStream<S> {
        #[pin]
        inner: S,
        transform: FilterTransform,
        done: bool,
    }
}

impl<S> FilterStream<S>
where
    S: Stream<Item = Result<Chunk, FilterError>>,
{
    /// Filter chunks produced by `inner`.
    pub fn new(inner: S, transform: FilterTransform) -> Self {
        let done = transform.is_always_false();
        if done {
            log_debug!(
                component = "stream",
                event = "filter_short_circuit",
                filter_column = %transform.filter_column(),
            );
        }
        Self {
            inner,
            transform,
            done,
        }
    }

    /// Header of yielded chunks.
    pub fn header(&self) -> &Header {
        self.transform.output_header()
    }
}

impl<S> Stream for FilterStream<S>
where
    S: Stream<Item = Result<Chunk, FilterError>>,
{
    type Item = Result<Chunk, FilterError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if *this.done {
                return Poll::Ready(None);
            }
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => match this.transform.transform(chunk) {
                    Ok(Some(chunk)) if chunk.has_rows() => return Poll::Ready(Some(Ok(chunk))),
                    Ok(_) => continue,
                    Err(err) => {
                        *this.done = true;
                        return Poll::Ready(Some(Err(err)));
                    }
                },
                Some(Err(err)) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    *this.done = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{AsArray, Int32Array, UInt8Array},
        datatypes::{DataType, Field, Int32Type},
    };
    use futures::{stream, StreamExt};

    use super::*;
    use crate::{column::Column, expression::ComputeColumn, option::FilterOptions};

    fn header() -> Header {
        Header::from(vec![
            Field::new("v", DataType::Int32, false),
            Field::new("f", DataType::UInt8, false),
        ])
    }

    fn chunk(values: Vec<i32>, flags: Vec<u8>) -> Result<Chunk, FilterError> {
        let rows = values.len();
        Chunk::try_new(
            vec![
                Column::dense(Arc::new(Int32Array::from(values))),
                Column::dense(Arc::new(UInt8Array::from(flags))),
            ],
            rows,
        )
    }

    #[tokio::test(flavor = "current_thread")]
    async fn skips_empty_chunks() {
        let transform = FilterTransform::try_new(
            header(),
            None,
            "f",
            FilterOptions::default().remove_filter_column(true),
        )
        .expect("transform");
        let input = stream::iter(vec![
            chunk(vec![1, 2, 3], vec![0, 1, 1]),
            chunk(vec![4], vec![0]),
            chunk(vec![5, 6], vec![1, 0]),
        ]);
        let filtered = FilterStream::new(input, transform);
        assert_eq!(filtered.header().len(), 1);

        let chunks: Vec<Chunk> = filtered
            .map(|chunk| chunk.expect("chunk"))
            .collect()
            .await;
        let values: Vec<i32> = chunks
            .iter()
            .flat_map(|chunk| {
                let array = chunk.column(0).expect("v").materialize().expect("materialize");
                array.as_primitive::<Int32Type>().values().to_vec()
            })
            .collect();
        assert_eq!(values, vec![2, 3, 5]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn static_false_never_polls_input() {
        let expression = ComputeColumn::new(Field::new("c", DataType::UInt8, false), |chunk| {
            Column::constant(Arc::new(UInt8Array::from(vec![0])), chunk.num_rows())
                .map_err(Into::into)
        })
        .with_constant(Arc::new(UInt8Array::from(vec![0])));
        let transform = FilterTransform::try_new(
            header(),
            Some(Arc::new(expression)),
            "c",
            FilterOptions::default(),
        )
        .expect("transform");
        let input = stream::poll_fn(|_| -> Poll<Option<Result<Chunk, FilterError>>> {
            panic!("input must not be polled")
        });
        let mut filtered = FilterStream::new(input, transform);
        assert!(filtered.next().await.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn upstream_error_ends_stream() {
        let transform =
            FilterTransform::try_new(header(), None, "f", FilterOptions::default()).expect("transform");
        let input = stream::iter(vec![
            Err(FilterError::Stalled(1)),
            chunk(vec![1], vec![1]),
        ]);
        let mut filtered = FilterStream::new(input, transform);
        assert!(matches!(
            filtered.next().await,
            Some(Err(FilterError::Stalled(1)))
        ));
        assert!(filtered.next().await.is_none());
    }
}
