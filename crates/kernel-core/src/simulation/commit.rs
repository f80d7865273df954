use super::*;
use rayon::prelude::*;

use crate::error::ConfigurationError;
use crate::psub::{merge_signals, Policy, Signals, Stage, StageContext};
use crate::random::policy_stream;

impl<R: RandomSource> Simulation<R> {
    /// Evaluates the stage run as `substep` against the current snapshot and,
    /// only if every policy and update succeeded, commits it and logs the row.
    pub(super) fn run_substep(&mut self, timestep: u64, substep: usize) -> Result<()> {
        let (label, values) = self.evaluate_stage(timestep, substep)?;
        for value in values {
            self.state.apply(value);
        }
        self.push_row(timestep, substep, label);
        Ok(())
    }

    pub(super) fn evaluate_stage(
        &self,
        timestep: u64,
        substep: usize,
    ) -> Result<(String, Vec<StateValue>)> {
        let stage = self
            .psub
            .stage(substep)
            .ok_or_else(|| SimulationError::NotFound(format!("stage for substep {substep}")))?;
        let ctx = StageContext {
            timestep,
            substep,
            label: &stage.label,
            config: &self.config,
        };

        let outputs = self.evaluate_policies(stage, &ctx)?;
        let signals = merge_signals(stage, outputs)?;

        let mut values = Vec::with_capacity(stage.updates.len());
        for update in &stage.updates {
            let value = (update.func)(&ctx, &self.state, &signals)?;
            if value.key() != update.key {
                return Err(ConfigurationError::KeyMismatch {
                    label: stage.label.clone(),
                    update: update.name.to_string(),
                    declared: update.key,
                    produced: value.key(),
                }
                .into());
            }
            if let Some((subject, quantity, offending)) = value.numeric_violation() {
                return Err(SimulationError::NumericInstability {
                    timestep,
                    substep,
                    subject,
                    quantity,
                    value: offending,
                });
            }
            values.push(value);
        }
        Ok((stage.label.clone(), values))
    }

    /// Outputs in policy order. On failure the first error in policy order is
    /// reported, however the policies were scheduled.
    fn evaluate_policies(&self, stage: &Stage, ctx: &StageContext<'_>) -> Result<Vec<Signals>> {
        let results = match &self.policy_pool {
            Some(pool) if stage.policies.len() > 1 => pool.install(|| {
                stage
                    .policies
                    .par_iter()
                    .enumerate()
                    .map(|(index, policy)| self.evaluate_policy(ctx, index, policy))
                    .collect::<Vec<_>>()
            }),
            _ => stage
                .policies
                .iter()
                .enumerate()
                .map(|(index, policy)| self.evaluate_policy(ctx, index, policy))
                .collect::<Vec<_>>(),
        };
        results.into_iter().collect()
    }

    fn evaluate_policy(
        &self,
        ctx: &StageContext<'_>,
        index: usize,
        policy: &Policy,
    ) -> Result<Signals> {
        let mut rng = R::from_stream(
            self.config.seed,
            policy_stream(ctx.timestep, ctx.substep, index),
        );
        (policy.func)(ctx, &self.state, &mut rng)
    }
}
