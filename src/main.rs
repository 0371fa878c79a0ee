use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kpdf_highlights::mapper::{self, Point, Rect};
use kpdf_highlights::{
    ConfidenceMapper, DocumentId, HighlightGeometry, HighlightRecord, HighlightSession,
    HighlightStore, HighlightsConfig, PageFrame, PersistenceGateway, RenderSurface, SledHighlightStore,
    StandardConfidenceMapper, logger,
};

#[derive(Debug, Parser)]
#[command(name = "kpdf-highlights")]
#[command(about = "Inspect and edit kPDF confidence highlights")]
struct Cli {
    /// Configuration file (defaults to KPDF_HIGHLIGHTS_CONFIG or the kPDF state dir).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the stored highlights of a document.
    List {
        document: String,
        /// Also print absolute rectangles for a page of this size.
        #[arg(long, value_name = "WxH", value_parser = parse_size)]
        frame: Option<(f32, f32)>,
        #[arg(long)]
        json: bool,
    },
    /// Store a highlight from a pixel rectangle on a page of the given size.
    Add {
        document: String,
        /// Page index, or `*` for every page.
        page: String,
        color: String,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        #[arg(long, value_name = "WxH", value_parser = parse_size)]
        frame: (f32, f32),
    },
    /// Print the zoom transform that centers a stored highlight.
    Focus {
        document: String,
        index: usize,
        #[arg(long, value_name = "WxH", value_parser = parse_size)]
        frame: (f32, f32),
        #[arg(long, value_name = "WxH", value_parser = parse_size)]
        viewport: (f32, f32),
    },
    /// Turn the persistent debug log on or off.
    Logging {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
}

fn parse_size(raw: &str) -> std::result::Result<(f32, f32), String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{raw}'"))?;
    let width: f32 = width.trim().parse().map_err(|_| format!("bad width in '{raw}'"))?;
    let height: f32 = height.trim().parse().map_err(|_| format!("bad height in '{raw}'"))?;
    if !(width > 0.0 && height > 0.0) {
        return Err(format!("size must be positive, got '{raw}'"));
    }
    Ok((width, height))
}

/// A single page at the origin of the viewer.
struct StaticSurface {
    page: usize,
    frame: Rect,
}

impl RenderSurface for StaticSurface {
    fn current_page_index(&self) -> usize {
        self.page
    }

    fn page_frame(&self) -> Option<PageFrame> {
        Some(PageFrame {
            frame: self.frame,
            offset: Point::default(),
        })
    }
}

fn open_gateway(config: &HighlightsConfig) -> Result<PersistenceGateway> {
    let db_path = config.db_path();
    let store = SledHighlightStore::open(&db_path);
    if !store.is_available() {
        anyhow::bail!("highlight store unavailable at {}", db_path.display());
    }
    Ok(PersistenceGateway::new(
        Rc::new(store),
        Rc::new(StandardConfidenceMapper),
        config.retry_policy(),
    ))
}

fn describe(index: usize, geometry: &HighlightGeometry, mapper: &dyn ConfidenceMapper) -> String {
    let pct = geometry.percent_rect();
    let id = geometry
        .id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let page = geometry
        .page()
        .map(|page| page.to_string())
        .unwrap_or_else(|| "*".to_string());
    format!(
        "#{index} id={id} page={page} color={} x={:.4} y={:.4} w={:.4} h={:.4}",
        mapper.label(geometry.color()),
        pct.x_pct,
        pct.y_pct,
        pct.w_pct,
        pct.h_pct
    )
}

async fn run_list(
    config: &HighlightsConfig,
    document: DocumentId,
    frame: Option<(f32, f32)>,
    json: bool,
) -> Result<()> {
    let gateway = open_gateway(config)?;
    let geometries = gateway
        .load(&document)
        .await
        .with_context(|| format!("failed to load highlights for {document}"))?;

    if json {
        let records: Vec<HighlightRecord> = geometries
            .iter()
            .map(|geometry| geometry.to_record(&document, gateway.mapper()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if geometries.is_empty() {
        println!("no highlights for {document}");
        return Ok(());
    }
    for (index, geometry) in geometries.iter().enumerate() {
        let line = describe(index, geometry, gateway.mapper());
        match frame {
            Some((width, height)) => {
                let rect = geometry.to_absolute_rect(&Rect::sized(width, height), 0.0, 0.0);
                println!(
                    "{line} -> [{:.1}, {:.1}, {:.1}x{:.1}]",
                    rect.left, rect.top, rect.width, rect.height
                );
            }
            None => println!("{line}"),
        }
    }
    Ok(())
}

async fn run_add(
    config: &HighlightsConfig,
    document: DocumentId,
    page: &str,
    color: &str,
    rect: Rect,
    frame: (f32, f32),
) -> Result<()> {
    let gateway = open_gateway(config)?;
    let table = gateway.mapper();
    let page = match page {
        "*" => None,
        index => Some(
            index
                .parse::<usize>()
                .with_context(|| format!("page must be an index or '*', got '{index}'"))?,
        ),
    };
    let color = table
        .from_label(color)
        .with_context(|| format!("unknown color '{color}'"))?;

    let frame = Rect::sized(frame.0, frame.1);
    let local = mapper::normalize_to_target(&rect, &frame, Point::default());
    let geometry = HighlightGeometry::from_rect(
        &local,
        &frame,
        color,
        table.confidence_for(color),
        page,
        table,
    )?;
    let id = gateway.save(&geometry, &document).await?;
    println!("{}", describe(0, &geometry.with_id(id), table));
    Ok(())
}

async fn run_focus(
    config: &HighlightsConfig,
    document: DocumentId,
    index: usize,
    frame: (f32, f32),
    viewport: (f32, f32),
) -> Result<()> {
    let gateway = open_gateway(config)?;
    let geometries = gateway.load(&document).await?;
    let geometry = geometries
        .get(index)
        .cloned()
        .with_context(|| format!("{document} has {} highlights, no #{index}", geometries.len()))?;

    let surface = Rc::new(StaticSurface {
        page: geometry.page().unwrap_or_default(),
        frame: Rect::sized(frame.0, frame.1),
    });
    let session = HighlightSession::new(gateway, surface, config);
    let transform = session.focus_on(&geometry, &Rect::sized(viewport.0, viewport.1))?;
    let crop = session.crop_for(&geometry);

    println!(
        "scale={:.4} translate=({:.1}, {:.1})",
        transform.scale, transform.translate_x, transform.translate_y
    );
    println!(
        "crop x={:.4} y={:.4} w={:.4} h={:.4}",
        crop.x_pct, crop.y_pct, crop.w_pct, crop.h_pct
    );
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Logging { state } = &cli.command {
        if state == "on" {
            if !logger::enable_file_logging() {
                anyhow::bail!("could not enable file logging");
            }
            if let Some(path) = logger::log_file_path() {
                println!("logging to {}", path.display());
            }
        } else {
            logger::disable_file_logging();
            println!("file logging disabled");
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => HighlightsConfig::load(path)?,
        None => HighlightsConfig::load_or_default()?,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to start runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::List {
                document,
                frame,
                json,
            } => run_list(&config, document.into(), frame, json).await,
            Commands::Add {
                document,
                page,
                color,
                x,
                y,
                w,
                h,
                frame,
            } => run_add(&config, document.into(), &page, &color, Rect::new(x, y, w, h), frame).await,
            Commands::Focus {
                document,
                index,
                frame,
                viewport,
            } => run_focus(&config, document.into(), index, frame, viewport).await,
            Commands::Logging { .. } => Ok(()),
        }
    })
}

fn main() {
    logger::initialize();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("400x200"), Ok((400.0, 200.0)));
        assert_eq!(parse_size("612.5X792"), Ok((612.5, 792.0)));
        assert!(parse_size("400").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("ax10").is_err());
    }

    #[test]
    fn cli_shapes() {
        let cli = Cli::parse_from([
            "kpdf-highlights",
            "add",
            "doc-1",
            "*",
            "green",
            "50",
            "75",
            "50",
            "30",
            "--frame",
            "400x200",
        ]);
        match cli.command {
            Commands::Add { page, frame, .. } => {
                assert_eq!(page, "*");
                assert_eq!(frame, (400.0, 200.0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
