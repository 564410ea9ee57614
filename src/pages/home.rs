use std::collections::HashMap;
use std::f64::consts::PI;

use leptos::prelude::*;
use log::debug;

use crate::components::memory_graph::{
	DocumentData, Edge, EdgeType, FetchTracker, ForceLayout, GraphData, GraphIntent, GraphSource,
	InMemorySource, MemoryData, MemoryGraphCanvas, Node, ViewportInfo,
};

const COLORS: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];
const DOC_TYPES: &[&str] = &["note", "pdf", "web page", "email"];
const LAYOUT_DT: f32 = 0.016;

/// Deterministic corpus: documents, their memories, version chains, and
/// cross-document similarity links.
fn generate_corpus(documents: usize) -> GraphData {
	let mut nodes = Vec::new();
	let mut edges = Vec::new();
	let mut memories: Vec<String> = Vec::new();

	for d in 0..documents {
		let color = COLORS[d % COLORS.len()];
		let angle = d as f64 * 2.0 * PI / documents.max(1) as f64;
		let (dx, dy) = (600.0 * angle.cos(), 600.0 * angle.sin());
		let doc_id = format!("doc-{d}");
		nodes.push(
			Node::document(
				doc_id.clone(),
				dx,
				dy,
				28.0,
				DocumentData {
					title: format!("Document {d}"),
					summary: Some(format!("Notes collected from source {d}.")),
					doc_type: DOC_TYPES[d % DOC_TYPES.len()].into(),
				},
			)
			.with_border(color),
		);

		let facts = 2 + (rand_simple(d) * 5.0) as usize;
		for f in 0..facts {
			let versions = if rand_simple(d * 31 + f) > 0.7 { 2 } else { 1 };
			let spin = angle + f as f64 * 2.0 * PI / facts as f64;
			let mut previous: Option<String> = None;
			for v in 1..=versions {
				let id = format!("mem-{d}-{f}-v{v}");
				let r = 80.0 + 30.0 * v as f64;
				let seed = d * 101 + f * 7 + v;
				nodes.push(
					Node::memory(
						id.clone(),
						dx + r * spin.cos(),
						dy + r * spin.sin(),
						14.0,
						MemoryData {
							content: format!("Fact {f} from document {d}, revision {v}."),
							version: v as u32,
							is_latest: v == versions,
							is_forgotten: rand_simple(seed) > 0.93,
							forget_after: (rand_simple(seed + 3) > 0.85).then(|| "2026-12-31".to_string()),
						},
					)
					.with_border(color),
				);
				edges.push(Edge::new(doc_id.clone(), id.clone(), EdgeType::DocMemory));
				if let Some(prev) = previous.replace(id.clone()) {
					edges.push(Edge::new(prev, id.clone(), EdgeType::Version));
				}
				memories.push(id);
			}
		}
	}

	for i in (0..memories.len()).step_by(3) {
		let j = (rand_simple(i + 17) * memories.len() as f64) as usize;
		if let Some(other) = memories.get(j).filter(|other| **other != memories[i]) {
			edges.push(Edge::similarity(memories[i].clone(), other.clone(), rand_simple(i + 5)));
		}
	}

	GraphData { nodes, edges }
}

/// Runs the force layout to rest and adopts its positions.
fn settle(mut data: GraphData) -> GraphData {
	let mut layout = ForceLayout::new(&data);
	while layout.step(&data.nodes, LAYOUT_DT) {}
	let positions: HashMap<String, (f64, f64)> =
		layout.positions().into_iter().map(|(id, x, y)| (id, (x, y))).collect();
	for node in &mut data.nodes {
		if let Some(&(x, y)) = positions.get(&node.id) {
			node.x = x;
			node.y = y;
		}
	}
	data
}

/// Simple pseudo-random number generator (deterministic for consistency).
fn rand_simple(seed: usize) -> f64 {
	let x = ((seed + 1) * 9301 + 49297) % 233280;
	(x as f64) / 233280.0
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let source = StoredValue::new(InMemorySource::new(settle(generate_corpus(24))));
	let tracker = StoredValue::new(FetchTracker::default());
	let graph_data = RwSignal::new(source.with_value(|s| s.data().clone()));
	let selected = RwSignal::new(None::<String>);

	let on_viewport = Callback::new(move |info: ViewportInfo| {
		let region = tracker.try_update_value(|t| t.next_fetch(&info.bounds, info.zoom)).flatten();
		if let Some(region) = region {
			graph_data.set(source.with_value(|s| s.fetch_viewport(&region)));
		}
	});
	let on_intent = Callback::new(move |intent: GraphIntent| match intent {
		GraphIntent::Click(id) => selected.set(id),
		GraphIntent::DragStart { id, .. } => debug!("dragging {id}"),
		GraphIntent::Hover(_) | GraphIntent::DragEnd => {}
	});

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<MemoryGraphCanvas
					data=graph_data
					selected=selected
					on_intent=on_intent
					on_viewport=on_viewport
					fullscreen=true
				/>
				<div class="graph-overlay">
					<h1>"Memory Graph"</h1>
					<p class="subtitle">
						"Click a node for details. Drag nodes or the background. Scroll or pinch to zoom."
					</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
