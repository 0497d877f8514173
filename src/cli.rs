use crate::config::{Config, load_config};
use crate::graph::FamilyGraph;
use crate::layout::{Diagram, LayoutEngine};
use crate::layout_dump::{DiagramDump, write_diagram_dump};
use crate::model::{PersonId, format_iso_date};
use crate::persist::{load_family_tree, save_family_tree};
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::text_metrics::FontMeasure;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kindred", version, about = "Lay out and render a family tree from its XML file")]
pub struct Args {
    /// Family tree file (<familyTree> XML)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Id of the person the diagram is centered on. Defaults to the first person in the file.
    #[arg(short = 'r', long = "root")]
    pub root: Option<String>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, layout, render)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// PNG width. Overrides `render.width` from the config file.
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// PNG height. Overrides `render.height` from the config file.
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Print everyone in display order instead of drawing
    #[arg(long = "list")]
    pub list: bool,

    /// Write the loaded tree back out to this path
    #[arg(long = "resave")]
    pub resave: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run(args: &Args) -> Result<()> {
    let config = settings(args)?;

    let graph = load_family_tree(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    if let Some(path) = &args.resave {
        save_family_tree(&graph, path).with_context(|| format!("Failed to save {}", path.display()))?;
        info!(path:? = path; "Tree re-saved");
    }

    if args.list {
        print!("{}", list_people(&graph));
        return Ok(());
    }

    let root = resolve_root(&graph, args.root.as_deref())?;
    let diagram = layout(&graph, &root, &config)?;

    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&diagram, &config.theme, &config.layout);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&diagram, &config.theme, &config.layout);
            write_output_png(&svg, &output, &config.render, &config.theme)?;
        }
        OutputFormat::Json => match args.output.as_deref() {
            Some(path) => write_diagram_dump(path, &diagram)?,
            None => println!(
                "{}",
                serde_json::to_string_pretty(&DiagramDump::from_diagram(&diagram))?
            ),
        },
    }
    Ok(())
}

fn settings(args: &Args) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    Ok(config)
}

fn layout(graph: &FamilyGraph, root: &PersonId, config: &Config) -> Result<Diagram> {
    let measure = FontMeasure::from_config(&config.layout);
    let diagram = LayoutEngine::new(graph, &config.layout).build(root.as_str(), &measure)?;
    info!(
        root:% = root,
        nodes = diagram.nodes.len(),
        width = diagram.width,
        height = diagram.height;
        "Diagram laid out",
    );
    Ok(diagram)
}

fn resolve_root(graph: &FamilyGraph, requested: Option<&str>) -> Result<PersonId> {
    match requested {
        Some(id) if graph.contains(id) => Ok(PersonId::from(id)),
        Some(id) => Err(anyhow::anyhow!("No person with id `{id}` in the tree")),
        None => graph
            .ids()
            .next()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("The tree has no people to draw")),
    }
}

/// One tab-separated line per person: id, name, birth date, death date.
fn list_people(graph: &FamilyGraph) -> String {
    let mut out = String::new();
    for id in graph.sorted_for_display() {
        let Some(person) = graph.person(id.as_str()) else {
            continue;
        };
        let birth = person.birth_date().map(format_iso_date).unwrap_or_default();
        let death = person.death_date().map(format_iso_date).unwrap_or_default();
        out.push_str(&format!("{id}\t{}\t{birth}\t{death}\n", person.display_name()));
    }
    out
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Person, parse_date};

    fn graph() -> FamilyGraph {
        let mut graph = FamilyGraph::new();
        graph
            .add_person(Person::new("7", "Zed").born(parse_date("1990-01-01").unwrap()))
            .unwrap();
        graph.add_person(Person::new("3", "Amy")).unwrap();
        graph
    }

    #[test]
    fn root_defaults_to_first_person() {
        let graph = graph();
        assert_eq!(resolve_root(&graph, None).unwrap(), "7");
        assert_eq!(resolve_root(&graph, Some("3")).unwrap(), "3");
        assert!(resolve_root(&graph, Some("9")).is_err());
        assert!(resolve_root(&FamilyGraph::new(), None).is_err());
    }

    #[test]
    fn list_is_in_display_order() {
        let listing = list_people(&graph());
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines, vec!["3\tAmy\t\t", "7\tZed\t1990-01-01\t"]);
    }

    #[test]
    fn args_accept_long_flags() {
        let args = Args::parse_from([
            "kindred",
            "-i",
            "tree.xml",
            "--root",
            "1",
            "-e",
            "json",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.root.as_deref(), Some("1"));
        assert_eq!(args.input, PathBuf::from("tree.xml"));
        assert!(!args.list);
    }

    #[test]
    fn png_size_flags_override_config_only_when_given() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kindred.json5");
        std::fs::write(&path, "{ render: { width: 640, height: 480 } }").unwrap();
        let config_arg = path.to_string_lossy().into_owned();

        let from_file = Args::parse_from(["kindred", "-i", "t.xml", "-c", config_arg.as_str()]);
        let config = settings(&from_file).unwrap();
        assert_eq!(config.render.width, 640.0);
        assert_eq!(config.render.height, 480.0);

        let overridden =
            Args::parse_from(["kindred", "-i", "t.xml", "-c", config_arg.as_str(), "-w", "300"]);
        let config = settings(&overridden).unwrap();
        assert_eq!(config.render.width, 300.0);
        assert_eq!(config.render.height, 480.0);

        let defaults = settings(&Args::parse_from(["kindred", "-i", "t.xml"])).unwrap();
        assert_eq!(defaults.render.width, 1200.0);
    }
}
