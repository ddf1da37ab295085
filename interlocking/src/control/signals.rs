use log::info;

use crate::control::World;
use crate::state::SignalAspect;
use crate::topology::SignalId;

pub fn set_halt(world: &mut World, signal: SignalId) {
    set_aspect(world, signal, SignalAspect::Halt);
}

pub fn set_go(world: &mut World, signal: SignalId) {
    set_aspect(world, signal, SignalAspect::Go);
}

fn set_aspect(world: &mut World, signal: SignalId, aspect: SignalAspect) {
    info!(
        "set signal {} to {}",
        world.topology.signals[signal].name, aspect
    );
    world.state.signals[signal] = aspect;
    let direction = world.topology.signals[signal].direction;
    for provider in world.providers.iter_mut() {
        provider.set_signal_aspect(signal, aspect, direction);
    }
}

/// Drops every signal to halt, issuing the aspect commands.
pub fn reset(world: &mut World) {
    for signal in 0..world.topology.signals.len() {
        set_halt(world, signal);
    }
}
