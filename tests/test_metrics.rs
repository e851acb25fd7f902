use std::path::PathBuf;

use parkseg::metrics::MetricsLog;
use parkseg::plot::{grid_shape, plot_comparison, plot_metrics, PlotError, TRAIN_COLOR, VALID_COLOR};

fn sample_log() -> anyhow::Result<MetricsLog> {
    let mut log = MetricsLog::new(["train_loss", "valid_loss", "foreground_acc", "dice"]);
    log.push_epoch(vec![0.9, 1.1, 0.5, 0.4])?;
    log.push_epoch(vec![0.6, 0.8, 0.7, 0.6])?;
    log.push_epoch(vec![0.4, 0.7, 0.8, 0.7])?;
    Ok(log)
}

#[test]
fn test_csv_header_and_epochs() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("logs").join("pspnet_metrics.csv");

    sample_log()?.write_csv(&path)?;

    let text = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "epoch,train_loss,valid_loss,foreground_acc,dice");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("1,0.9,"));
    assert!(lines[3].starts_with("3,0.4,"));
    Ok(())
}

#[test]
fn test_read_back_written_csv() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("metrics.csv");
    let log = sample_log()?;
    log.write_csv(&path)?;

    let read = MetricsLog::read_csv(&path)?;

    assert_eq!(read, log);
    assert_eq!(read.column("dice"), Some(vec![0.4, 0.6, 0.7]));
    assert_eq!(read.column("missing"), None);
    Ok(())
}

#[test]
fn test_push_checks_width() -> anyhow::Result<()> {
    let mut log = MetricsLog::new(["train_loss", "valid_loss"]);
    assert!(log.push_epoch(vec![1.0]).is_err());
    assert_eq!(log.epochs(), 0);
    Ok(())
}

#[test]
fn test_read_requires_epoch_column() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "step,loss\n1,0.5\n")?;

    assert!(MetricsLog::read_csv(&path).is_err());
    Ok(())
}

#[test]
fn test_grid_shape() {
    assert_eq!(grid_shape(1), (1, 1));
    assert_eq!(grid_shape(3), (1, 3));
    assert_eq!(grid_shape(4), (2, 2));
    assert_eq!(grid_shape(5), (2, 3));
    assert_eq!(grid_shape(10), (3, 4));
}

#[test]
fn test_plot_metrics_draws_loss_panel() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let out = dir.path().join("figures").join("metrics.png");
    let log = sample_log()?;

    plot_metrics(&log.series(), log.names(), &out)?;

    // Three panels for four series: one row of three
    let plot = image::open(&out)?.to_rgb8();
    assert_eq!(plot.dimensions(), (3 * 480, 320));
    let first_panel = |x: u32| x < 480;
    assert!(plot.enumerate_pixels().any(|(x, _, p)| first_panel(x) && *p == TRAIN_COLOR));
    assert!(plot.enumerate_pixels().any(|(x, _, p)| first_panel(x) && *p == VALID_COLOR));
    assert!(!plot.enumerate_pixels().any(|(x, _, p)| !first_panel(x) && *p == TRAIN_COLOR));
    Ok(())
}

#[test]
fn test_plot_metrics_needs_two_series() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = dir.path().join("x.png");
    let err = plot_metrics(&[vec![1.0]], &["train_loss".to_string()], &out).unwrap_err();
    assert!(matches!(err, PlotError::NotEnoughSeries(1)));
    assert!(!out.exists());
}

#[test]
fn test_comparison_plot() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let a = dir.path().join("a.csv");
    let b = dir.path().join("b.csv");
    sample_log()?.write_csv(&a)?;
    sample_log()?.write_csv(&b)?;
    let out = dir.path().join("compare.png");

    plot_comparison(
        &[a, b],
        &["pspnet".to_string(), "unet".to_string()],
        "valid_loss",
        &out,
        Some(2),
    )?;

    assert!(out.is_file());
    Ok(())
}

#[test]
fn test_comparison_errors() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let a = dir.path().join("a.csv");
    sample_log()?.write_csv(&a)?;
    let out = dir.path().join("compare.png");

    let mismatch = plot_comparison(&[a.clone()], &[], "valid_loss", &out, None).unwrap_err();
    assert!(matches!(mismatch, PlotError::NameMismatch { paths: 1, names: 0 }));

    let missing = plot_comparison(&[a], &["a".to_string()], "iou", &out, None).unwrap_err();
    assert!(matches!(missing, PlotError::MissingColumn { ref column, .. } if column == "iou"));

    let unreadable = plot_comparison(
        &[PathBuf::from("no/such.csv")],
        &["x".to_string()],
        "valid_loss",
        &out,
        None,
    )
    .unwrap_err();
    assert!(matches!(unreadable, PlotError::Csv { .. }));

    assert!(!out.exists());
    Ok(())
}
