use crate::app::{format_throughput, App};
use netgauge::speedtest::rating::Rating;
use netgauge::{TestPhase, Throughput};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

const HIGHLIGHT: Color = Color::Rgb(110, 150, 230);
const DOWN: Color = Color::Rgb(134, 194, 156);
const DOWN_DIM: Color = Color::Rgb(78, 118, 92);
const UP: Color = Color::Rgb(150, 178, 222);
const UP_DIM: Color = Color::Rgb(88, 108, 140);
const PING: Color = Color::Rgb(222, 182, 128);
const PING_DIM: Color = Color::Rgb(128, 104, 76);
const FG: Color = Color::Rgb(228, 228, 228);
const FG_SOFT: Color = Color::Rgb(158, 158, 158);
const FG_MUTED: Color = Color::Rgb(98, 98, 104);
const FRAME: Color = Color::Rgb(58, 58, 64);
const FRAME_ACTIVE: Color = Color::Rgb(104, 104, 114);

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(6),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .split(frame.area());

    draw_header(frame, chunks[0], app);

    let panels = Layout::horizontal([
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
    ])
    .split(chunks[1]);

    draw_ping_panel(frame, panels[0], app);
    draw_throughput_panel(frame, panels[1], app, TestPhase::Download);
    draw_throughput_panel(frame, panels[2], app, TestPhase::Upload);

    draw_live_chart(frame, chunks[2], app);
    draw_help(frame, chunks[3], app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let phase = app.phase();
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(FRAME))
        .title(Span::styled(
            " netgauge ",
            Style::default().fg(FG).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [steps_area, status_area] =
        Layout::horizontal([Constraint::Min(24), Constraint::Length(28)]).areas(inner);

    frame.render_widget(Paragraph::new(phase_steps(phase)), steps_area);

    let status = match phase {
        TestPhase::Idle => Span::styled("press enter to start", Style::default().fg(FG_MUTED)),
        TestPhase::Complete => Span::styled("done", Style::default().fg(HIGHLIGHT)),
        active => Span::styled(
            format!("{:>3.0}% of {}", app.state.progress, step_label(active)),
            Style::default().fg(phase_color(active)),
        ),
    };
    frame.render_widget(
        Paragraph::new(Line::from(status)).alignment(Alignment::Right),
        status_area,
    );
}

const STEPS: [TestPhase; 3] = [TestPhase::Ping, TestPhase::Download, TestPhase::Upload];

fn step_label(phase: TestPhase) -> &'static str {
    match phase {
        TestPhase::Ping => "latency",
        TestPhase::Download => "download",
        TestPhase::Upload => "upload",
        TestPhase::Idle | TestPhase::Complete => "",
    }
}

fn phase_color(phase: TestPhase) -> Color {
    match phase {
        TestPhase::Ping => PING,
        TestPhase::Download => DOWN,
        TestPhase::Upload => UP,
        TestPhase::Idle | TestPhase::Complete => FG_MUTED,
    }
}

/// Position of `step` relative to `current`: `Less` when done, `Equal` while
/// running, `Greater` when still ahead.
fn step_position(step: TestPhase, current: TestPhase) -> std::cmp::Ordering {
    let rank = |phase: TestPhase| match phase {
        TestPhase::Idle => 0,
        TestPhase::Ping => 1,
        TestPhase::Download => 2,
        TestPhase::Upload => 3,
        TestPhase::Complete => 4,
    };
    if current == TestPhase::Idle {
        return std::cmp::Ordering::Greater;
    }
    rank(step).cmp(&rank(current))
}

fn phase_steps(current: TestPhase) -> Line<'static> {
    let mut spans = Vec::with_capacity(STEPS.len() * 2);
    for (i, step) in STEPS.into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" ── ", Style::default().fg(FRAME)));
        }
        let (marker, style) = match step_position(step, current) {
            std::cmp::Ordering::Less => ("✓", Style::default().fg(FG_SOFT)),
            std::cmp::Ordering::Equal => (
                "●",
                Style::default().fg(phase_color(step)).add_modifier(Modifier::BOLD),
            ),
            std::cmp::Ordering::Greater => ("○", Style::default().fg(FG_MUTED)),
        };
        spans.push(Span::styled(format!("{marker} {}", step_label(step)), style));
    }
    Line::from(spans)
}

fn panel_block(title: &str, color: Color, active: bool) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if active { FRAME_ACTIVE } else { FRAME }))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(if active { color } else { FG_SOFT }),
        ))
}

fn draw_ping_panel(frame: &mut Frame, area: Rect, app: &App) {
    let active = app.phase() == TestPhase::Ping;
    let block = panel_block("Latency", PING, active);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .split(inner);

    let result = &app.state.result;
    let (value, rating) = if result.ping_ms > 0 {
        (
            format!("{} ms", result.ping_ms),
            format!("{} · jitter {:.1} ms", Rating::latency(result.ping_ms), result.jitter_ms),
        )
    } else {
        ("—".to_string(), String::new())
    };

    render_value(frame, chunks[0], value);
    render_muted(frame, chunks[1], rating);
    if active {
        draw_progress_bar(frame, chunks[2], app.state.progress / 100.0, PING, PING_DIM);
    }
}

type PanelStyle = (&'static str, Color, Color, Throughput, fn(f64) -> Rating);

fn draw_throughput_panel(frame: &mut Frame, area: Rect, app: &App, phase: TestPhase) {
    let result = &app.state.result;
    let (title, color, dim_color, throughput, rate): PanelStyle = match phase {
        TestPhase::Download => (
            "Download",
            DOWN,
            DOWN_DIM,
            result.download,
            Rating::download,
        ),
        _ => ("Upload", UP, UP_DIM, result.upload, Rating::upload),
    };

    let active = app.phase() == phase;
    let block = panel_block(title, color, active);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .split(inner);

    let (value, rating) = if active {
        (format!("{:.1} Mbps", app.state.live_mbps), String::new())
    } else {
        match throughput {
            Throughput::Measured(mbps) | Throughput::Synthetic(mbps) => {
                (format_throughput(&throughput), rate(mbps).to_string())
            }
            _ => (format_throughput(&throughput), String::new()),
        }
    };

    render_value(frame, chunks[0], value);
    render_muted(frame, chunks[1], rating);
    if active {
        draw_progress_bar(frame, chunks[2], app.state.progress / 100.0, color, dim_color);
    }
}

fn render_value(frame: &mut Frame, area: Rect, value: String) {
    frame.render_widget(
        Paragraph::new(value)
            .style(Style::default().fg(FG).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center),
        area,
    );
}

fn render_muted(frame: &mut Frame, area: Rect, text: String) {
    frame.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(FG_MUTED))
            .alignment(Alignment::Center),
        area,
    );
}

fn draw_progress_bar(frame: &mut Frame, area: Rect, ratio: f64, color: Color, dim_color: Color) {
    if area.width < 4 {
        return;
    }

    let width = (area.width - 2) as usize;
    let filled = ((ratio.clamp(0.0, 1.0) * width as f64) as usize).min(width);
    let empty = width.saturating_sub(filled);

    let bar = Line::from(vec![
        Span::raw(" "),
        Span::styled("━".repeat(filled), Style::default().fg(color)),
        Span::styled("━".repeat(empty), Style::default().fg(dim_color)),
        Span::raw(" "),
    ]);

    frame.render_widget(Paragraph::new(bar), area);
}

fn draw_live_chart(frame: &mut Frame, area: Rect, app: &App) {
    let (samples, color, label) = match app.phase() {
        TestPhase::Upload => (&app.upload_samples, UP, "upload"),
        TestPhase::Complete if !app.upload_samples.is_empty() => {
            (&app.upload_samples, UP, "upload")
        }
        _ => (&app.download_samples, DOWN, "download"),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(FRAME))
        .title(Span::styled(format!(" live {label} (Mbps) "), Style::default().fg(FG_SOFT)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if samples.is_empty() || inner.width < 4 || inner.height < 2 {
        return;
    }

    let max_val = samples.iter().copied().fold(0.0_f64, f64::max).max(1.0);
    let points: Vec<(f64, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .x_axis(Axis::default().bounds([0.0, samples.len() as f64]))
        .y_axis(
            Axis::default()
                .bounds([0.0, max_val * 1.1])
                .labels(vec![
                    Span::styled("0", Style::default().fg(FG_MUTED)),
                    Span::styled(format!("{max_val:.0}"), Style::default().fg(FG_MUTED)),
                ]),
        );

    frame.render_widget(chart, inner);
}

fn draw_help(frame: &mut Frame, area: Rect, app: &App) {
    let keys: &[(&str, &str)] = if app.phase().is_active() {
        &[("esc", "cancel"), ("q", "quit")]
    } else {
        &[("enter", "start"), ("q", "quit")]
    };

    let mut spans = Vec::new();
    for (i, (key, action)) in keys.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  ·  ", Style::default().fg(FG_MUTED)));
        }
        spans.push(Span::styled(*key, Style::default().fg(FG_SOFT)));
        spans.push(Span::styled(format!(" {action}"), Style::default().fg(FG_MUTED)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).alignment(Alignment::Center), area);
}
