//! Viewer application state and logic.

use std::collections::VecDeque;

use crate::sim::{SignalId, Simulator};

/// Cycles of history kept per signal.
pub const HISTORY: usize = 32;

/// Viewer application state.
pub struct ViewerApp {
    /// The simulation being viewed.
    pub sim: Simulator,
    /// Input signal adjusted with +/-, if the circuit has one.
    pub input: Option<SignalId>,
    /// Recent values, one ring per signal.
    pub history: Vec<VecDeque<i64>>,
    /// Is the viewer stepping continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Signal list scroll offset.
    pub scroll: usize,
}

impl ViewerApp {
    /// Create a viewer around an elaborated simulator.
    pub fn new(sim: Simulator, input: Option<SignalId>) -> Self {
        let history = vec![VecDeque::with_capacity(HISTORY); sim.store().len()];
        let mut app = Self {
            sim,
            input,
            history,
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            scroll: 0,
        };
        app.record();
        app
    }

    fn record(&mut self) {
        for id in self.sim.store().ids() {
            let ring = &mut self.history[id.index()];
            if ring.len() == HISTORY {
                ring.pop_front();
            }
            ring.push_back(self.sim.peek(id));
        }
    }

    /// Advance one cycle.
    pub fn step(&mut self) {
        match self.sim.step() {
            Ok(()) => {
                self.record();
                self.status = format!("Cycle {}", self.sim.cycle());
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Start stepping continuously.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous stepping.
    pub fn tick(&mut self) {
        if self.running {
            self.step();
        }
    }

    /// Flip `pid_enable`, if the design has it.
    pub fn toggle_enable(&mut self) {
        let result = self
            .sim
            .csr_read("pid_enable")
            .and_then(|v| self.sim.csr_write("pid_enable", 1 - v));
        self.status = match result {
            Ok(()) => format!("pid_enable = {}", self.sim.csr_read("pid_enable").unwrap_or(0)),
            Err(e) => format!("Error: {}", e),
        };
    }

    /// Nudge the input signal by `delta`.
    pub fn nudge_input(&mut self, delta: i64) {
        let Some(input) = self.input else {
            self.status = "This circuit has no adjustable input".into();
            return;
        };
        let value = self.sim.peek(input).saturating_add(delta);
        self.status = match self.sim.poke(input, value) {
            Ok(()) => format!("input = {}", self.sim.peek(input)),
            Err(e) => format!("Error: {}", e),
        };
    }

    /// Reset the simulation to cycle 0.
    pub fn reset(&mut self) {
        self.running = false;
        for ring in &mut self.history {
            ring.clear();
        }
        self.status = match self.sim.reset() {
            Ok(()) => "Reset. Ready.".into(),
            Err(e) => format!("Error: {}", e),
        };
        self.record();
    }
}

/// Run the viewer until the user quits.
pub fn run_viewer(sim: Simulator, input: Option<SignalId>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = ViewerApp::new(sim, input);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('e') => app.toggle_enable(),
                        KeyCode::Char('+') => app.nudge_input(100),
                        KeyCode::Char('-') => app.nudge_input(-100),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll = app.scroll.saturating_sub(1),
                        KeyCode::Down => {
                            if app.scroll + 1 < app.sim.store().len() {
                                app.scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        app.tick();

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::{Blinker, Pid, PidChain};

    #[test]
    fn test_history_tracks_steps() {
        let (design, b) = Blinker::design(8).unwrap();
        let mut app = ViewerApp::new(Simulator::new(design).unwrap(), None);
        for _ in 0..3 {
            app.step();
        }
        let counter: Vec<_> = app.history[b.counter.index()].iter().copied().collect();
        assert_eq!(counter, vec![0, 1, 2, 3]);

        app.reset();
        assert_eq!(app.history[b.counter.index()].len(), 1);
        assert_eq!(app.sim.cycle(), 0);
    }

    #[test]
    fn test_history_is_bounded() {
        let (design, b) = Blinker::design(8).unwrap();
        let mut app = ViewerApp::new(Simulator::new(design).unwrap(), None);
        for _ in 0..HISTORY * 2 {
            app.step();
        }
        assert_eq!(app.history[b.counter.index()].len(), HISTORY);
    }

    #[test]
    fn test_enable_and_input() {
        let (design, c) = PidChain::design(14, 25, &Pid::new()).unwrap();
        let mut app = ViewerApp::new(Simulator::new(design).unwrap(), Some(c.input));
        app.nudge_input(100);
        assert_eq!(app.sim.peek(c.input), 100);
        app.toggle_enable();
        assert_eq!(app.sim.peek(c.enable), 1);
        app.toggle_enable();
        assert_eq!(app.sim.peek(c.enable), 0);
    }
}
