use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};
use std::sync::Arc;

use crate::XRouteMapper;

#[derive(Debug)]
struct Instrumented(Arc<XRouteMapper>);

pub fn register(reg: &mut Registry, mapper: Arc<XRouteMapper>) {
    reg.register_collector(Box::new(Instrumented(mapper)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let sizes = self.0.index_sizes();

        let mut item_encoder = encoder.encode_descriptor(
            "xroute_mapper_tracked_items",
            "The number of tracked items per mapper index",
            None,
            MetricType::Gauge,
        )?;
        for (index, items, _) in &sizes {
            let labels = vec![("index", *index)];
            let gauge = ConstGauge::new(*items as u32);
            let encoder = item_encoder.encode_family(&labels)?;
            gauge.encode(encoder)?;
        }

        let mut link_encoder = encoder.encode_descriptor(
            "xroute_mapper_tracked_links",
            "The number of distinct links per mapper index",
            None,
            MetricType::Gauge,
        )?;
        for (index, _, links) in &sizes {
            let labels = vec![("index", *index)];
            let gauge = ConstGauge::new(*links as u32);
            let encoder = link_encoder.encode_family(&labels)?;
            gauge.encode(encoder)?;
        }

        Ok(())
    }
}
