//! UI rendering for the viewer.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::csr::CsrDirection;
use crate::sim::{Driver, SignalId};
use super::app::ViewerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &ViewerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(65),
            Constraint::Percentage(35),
        ])
        .split(frame.area());

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_signals(frame, left_chunks[0], app);
    draw_status(frame, left_chunks[1], app);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(6),
        ])
        .split(chunks[1]);

    draw_registers(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw the signal table with a short waveform per signal.
fn draw_signals(frame: &mut Frame, area: Rect, app: &ViewerApp) {
    let store = app.sim.store();
    let visible = (area.height as usize).saturating_sub(2);

    let items: Vec<ListItem> = store
        .ids()
        .skip(app.scroll)
        .take(visible)
        .map(|id| {
            let info = store.info(id);
            let driver = match app.sim.driver(id) {
                Some(Driver::Comb) => "comb",
                Some(Driver::Sync) => "sync",
                None => "in",
            };
            let value = app.sim.peek(id);
            let text = format!(
                "{:<28} {:>4} {:>4} {:>10}  {}",
                info.name,
                info.shape,
                driver,
                value,
                waveform(app, id),
            );

            let style = if changed(app, id) {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if value != 0 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let title = format!(" {} @ cycle {} ({:?}) ", app.sim.top().name(), app.sim.cycle(), app.sim.phase());
    let list = List::new(items)
        .block(Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Did the signal change on the last step?
fn changed(app: &ViewerApp, id: SignalId) -> bool {
    let ring = &app.history[id.index()];
    let n = ring.len();
    n >= 2 && ring[n - 1] != ring[n - 2]
}

/// Render history as a waveform: bits as high/low, wider signals as a
/// change marker.
fn waveform(app: &ViewerApp, id: SignalId) -> String {
    let one_bit = app.sim.store().shape(id).width() == 1;
    let ring = &app.history[id.index()];
    ring.iter()
        .enumerate()
        .map(|(i, &v)| {
            if one_bit {
                if v != 0 { '▔' } else { '▁' }
            } else if i > 0 && ring[i - 1] != v {
                '╳'
            } else {
                '═'
            }
        })
        .collect()
}

/// Draw the register bank.
fn draw_registers(frame: &mut Frame, area: Rect, app: &ViewerApp) {
    let items: Vec<ListItem> = app
        .sim
        .csrs()
        .into_iter()
        .map(|entry| {
            let (tag, style) = match entry.direction {
                CsrDirection::Status => ("ro", Style::default().fg(Color::Gray)),
                CsrDirection::Storage => ("rw", Style::default().fg(Color::Green)),
            };
            ListItem::new(format!("{:<16} {} {:>10}", entry.name, tag, entry.value)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &ViewerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  x: Reset"),
        Line::from("e: Toggle pid_enable  +/-: Input"),
        Line::from("↑↓: Scroll  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
