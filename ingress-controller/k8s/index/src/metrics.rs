use crate::{Kind, SharedCache};
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{counter::ConstCounter, gauge::ConstGauge, MetricType},
    registry::Registry,
};

#[derive(Debug)]
struct Instrumented(SharedCache);

/// Reports the size of each cache partition and the cache's generation.
pub fn register(reg: &mut Registry, cache: SharedCache) {
    reg.register_collector(Box::new(Instrumented(cache)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let (counts, generation) = {
            let cache = self.0.read();
            (cache.counts(), cache.generation())
        };

        let mut size_encoder = encoder.encode_descriptor(
            "cache_size",
            "The number of objects in the cache",
            None,
            MetricType::Gauge,
        )?;
        for kind in Kind::ALL {
            let labels = [("kind", kind.as_str())];
            let size = ConstGauge::new(counts.get(kind) as i64);
            let size_encoder = size_encoder.encode_family(&labels)?;
            size.encode(size_encoder)?;
        }

        let generation_encoder = encoder.encode_descriptor(
            "cache_updates",
            "The number of changes applied to the cache",
            None,
            MetricType::Counter,
        )?;
        ConstCounter::new(generation).encode(generation_encoder)?;

        Ok(())
    }
}
