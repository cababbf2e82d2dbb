//! Bulk transforms over a session's channels

use crate::decimation::Decimator;
use crate::filters::{FilterSpec, ZeroPhaseFilter};
use crate::normalize::{Normalization, Normalizer};
use crate::processor::ChannelProcessor;
use spiker_core::{ChannelFailure, Session, SpikerError, SpikerResult};

/// Channel transforms dispatched across a [`Session`].
///
/// `channel_index: None` targets every channel in index order. A channel
/// whose transform fails keeps its previous state while the remaining
/// channels are still processed; the call then reports every failed index
/// through [`SpikerError::ChannelFailures`]. `Some(index)` targets one
/// channel and returns its error unwrapped.
pub trait SessionTransform {
    /// Run `processor` on the targeted channels
    fn apply(
        &mut self,
        processor: &dyn ChannelProcessor,
        channel_index: Option<usize>,
    ) -> SpikerResult<()>;

    fn filter_all(&mut self, spec: &FilterSpec, channel_index: Option<usize>) -> SpikerResult<()> {
        self.apply(&ZeroPhaseFilter::new(*spec), channel_index)
    }

    fn decimate_all(&mut self, factor: usize, channel_index: Option<usize>) -> SpikerResult<()> {
        self.apply(&Decimator::new(factor)?, channel_index)
    }

    fn normalize_all(
        &mut self,
        normalization: Normalization,
        channel_index: Option<usize>,
    ) -> SpikerResult<()> {
        self.apply(&Normalizer::new(normalization), channel_index)
    }

    /// Standard deviation over `interval` of each targeted channel
    fn std_all(&self, interval: (f64, f64), channel_index: Option<usize>) -> SpikerResult<Vec<f64>>;
}

impl SessionTransform for Session {
    fn apply(
        &mut self,
        processor: &dyn ChannelProcessor,
        channel_index: Option<usize>,
    ) -> SpikerResult<()> {
        let targets = self.target_indices(channel_index)?;
        let mut failures = Vec::new();

        for index in targets {
            let outcome = processor.process(self.channel(index)?);
            match outcome {
                Ok(next) => {
                    self.replace_channel(index, next)?;
                }
                Err(error) if channel_index.is_some() => return Err(error),
                Err(error) => {
                    tracing::warn!(
                        channel = index,
                        processor = processor.name(),
                        %error,
                        "channel left unchanged"
                    );
                    failures.push(ChannelFailure { index, error });
                }
            }
        }

        tracing::info!(
            processor = processor.name(),
            channels = self.channel_count(),
            failed = failures.len(),
            "session transform finished"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SpikerError::ChannelFailures { failures })
        }
    }

    fn std_all(
        &self,
        interval: (f64, f64),
        channel_index: Option<usize>,
    ) -> SpikerResult<Vec<f64>> {
        let targets = self.target_indices(channel_index)?;
        let mut values = Vec::with_capacity(targets.len());
        let mut failures = Vec::new();

        for index in targets {
            match self.channel(index)?.std_deviation(interval) {
                Ok(value) => values.push(value),
                Err(error) if channel_index.is_some() => return Err(error),
                Err(error) => failures.push(ChannelFailure { index, error }),
            }
        }

        if failures.is_empty() {
            Ok(values)
        } else {
            Err(SpikerError::ChannelFailures { failures })
        }
    }
}
