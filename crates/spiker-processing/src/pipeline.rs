//! Processing pipeline for chaining channel processors

use crate::config::{PipelineConfig, ProcessingConfig, StageConfig};
use crate::decimation::Decimator;
use crate::filters::ZeroPhaseFilter;
use crate::normalize::Normalizer;
use crate::processor::{ChannelProcessor, ProcessorType};
use crate::session_ops::SessionTransform;
use spiker_core::{Channel, Session, SpikerError, SpikerResult};

/// Processing pipeline that chains multiple processors.
///
/// Stages run in order on a working copy; if any stage fails the input
/// channel is returned untouched along with that stage's error.
pub struct Pipeline {
    name: String,
    processors: Vec<Box<dyn ChannelProcessor>>,
}

/// Pipeline builder for constructing processing chains
pub struct PipelineBuilder {
    name: String,
    processors: Vec<Box<dyn ChannelProcessor>>,
}

impl Pipeline {
    /// Create new empty pipeline
    pub fn new(name: &str) -> Self {
        Pipeline { name: name.to_string(), processors: Vec::new() }
    }

    /// Add processor to pipeline
    pub fn add_processor(&mut self, processor: Box<dyn ChannelProcessor>) {
        self.processors.push(processor);
    }

    /// Build the chain described by a pipeline configuration
    pub fn from_config(pipeline: &PipelineConfig, config: &ProcessingConfig) -> SpikerResult<Self> {
        let mut builder = PipelineBuilder::new(&pipeline.name);

        for stage in &pipeline.stages {
            if let Some(spec) = stage.filter_spec(&config.filter)? {
                builder = builder.add_processor(Box::new(ZeroPhaseFilter::new(spec)));
            } else if let Some(normalization) = stage.normalization()? {
                builder = builder.add_processor(Box::new(Normalizer::new(normalization)));
            } else if let StageConfig::Decimate { factor } = stage {
                let decimator = Decimator::with_config(*factor, config.decimation)?;
                builder = builder.add_processor(Box::new(decimator));
            }
        }

        let built = builder.build();
        tracing::debug!(name = %built.name, stages = built.len(), "pipeline built from config");
        Ok(built)
    }

    /// Look up a named pipeline in `config` and build it
    pub fn named(config: &ProcessingConfig, name: &str) -> SpikerResult<Self> {
        let pipeline = config.get_pipeline(name).ok_or_else(|| SpikerError::Config {
            message: format!("Pipeline '{}' not found", name),
        })?;
        Self::from_config(pipeline, config)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Names of the stages in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Run the chain on the targeted session channels with per-channel
    /// failure attribution
    pub fn run(&self, session: &mut Session, channel_index: Option<usize>) -> SpikerResult<()> {
        session.apply(self, channel_index)
    }
}

impl ChannelProcessor for Pipeline {
    fn process(&self, input: &Channel) -> SpikerResult<Channel> {
        let mut current = input.clone();
        for processor in &self.processors {
            current = processor.process(&current)?;
        }
        Ok(current)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Chain
    }
}

impl PipelineBuilder {
    pub fn new(name: &str) -> Self {
        PipelineBuilder { name: name.to_string(), processors: Vec::new() }
    }

    pub fn add_processor(mut self, processor: Box<dyn ChannelProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline { name: self.name, processors: self.processors }
    }
}
