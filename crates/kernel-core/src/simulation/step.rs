use super::*;

impl<R: RandomSource> Simulation<R> {
    pub fn start(&mut self) {
        if !self.status.is_complete() && !self.status.is_aborted() {
            self.status.mode = RunMode::Running;
        }
    }

    pub fn pause(&mut self) {
        if !self.status.is_aborted() {
            self.status.mode = RunMode::Paused;
        }
    }

    pub fn run_id(&self) -> &str {
        &self.status.run_id
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn psub(&self) -> &Psub {
        &self.psub
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// State at timestep 0, substep 0.
    pub fn initial_state(&self) -> &SystemState {
        &self.initial_state
    }

    pub fn current_state(&self) -> &SystemState {
        &self.state
    }

    pub fn replay_hash(&self) -> u64 {
        self.replay_hash
    }

    /// Runs every stage of the next timestep. `Ok(false)` once the run is
    /// complete or has aborted. A failing substep aborts the run: nothing of
    /// that substep is committed and the log is marked incomplete.
    ///
    /// A paused run still advances one timestep per call and stays paused;
    /// only [`Simulation::start`] or [`Simulation::run`] put it in `Running`.
    pub fn step(&mut self) -> Result<bool> {
        if self.status.is_aborted() {
            return Ok(false);
        }
        if self.status.is_complete() {
            self.status.mode = RunMode::Paused;
            return Ok(false);
        }
        let timestep = self.status.current_timestep.saturating_add(1);
        self.status.current_timestep = timestep;

        for substep in 1..=self.psub.len() {
            if let Err(error) = self.run_substep(timestep, substep) {
                self.abort(timestep, substep, &error);
                return Err(error);
            }
        }

        if self.status.is_complete() {
            self.status.mode = RunMode::Paused;
            self.mark_log(LogStatus::Complete);
            info!(
                run_id = %self.status.run_id,
                timesteps = timestep,
                rows = self.event_log.len(),
                replay_hash = self.replay_hash,
                "simulation complete"
            );
        }
        Ok(true)
    }

    pub fn step_n(&mut self, n: u64) -> Result<u64> {
        let mut committed = 0_u64;
        for _ in 0..n {
            if !self.step()? {
                break;
            }
            committed += 1;
        }
        Ok(committed)
    }

    pub fn run_to_timestep(&mut self, timestep: u64) -> Result<u64> {
        let mut committed = 0_u64;
        while self.status.current_timestep < timestep {
            if !self.step()? {
                break;
            }
            committed += 1;
        }
        Ok(committed)
    }

    /// Steps until the configured number of timesteps has run.
    pub fn run(&mut self) -> Result<&EventLog> {
        self.start();
        while self.step()? {}
        Ok(&self.event_log)
    }

    fn abort(&mut self, timestep: u64, substep: usize, error: &SimulationError) {
        let label = self
            .psub
            .stage(substep)
            .map(|stage| stage.label.clone())
            .unwrap_or_default();
        warn!(
            run_id = %self.status.run_id,
            timestep,
            substep,
            label = %label,
            error = %error,
            "simulation aborted"
        );
        self.status.mode = RunMode::Aborted;
        self.mark_log(LogStatus::Incomplete {
            timestep,
            substep,
            label,
            reason: error.to_string(),
        });
    }
}
