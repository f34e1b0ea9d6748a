//! Headless-прогон симуляции (дебаг и профилирование без хоста)

use bevy::prelude::*;
use shadows_simulation::player::PlayerInput;
use shadows_simulation::Shadows;

fn main() {
    println!("🌑 Dungeon of Shadows — headless run");

    let mut sim = Shadows::new(42);

    let mut cue_count = 0usize;
    for tick in 0..1000u32 {
        // Бот бегает кругами и машет мечом
        let t = tick as f32 / 60.0;
        let mut input = PlayerInput::default();
        input.move_dir = Vec2::new(t.cos(), t.sin());
        input.aim = sim.player_position() + input.move_dir * 120.0;
        input.melee_pressed = tick % 30 == 0;
        input.ranged_pressed = tick % 45 == 0;
        sim.set_input(input);

        sim.tick();
        cue_count += sim.drain_events().len();

        if tick % 100 == 0 {
            let (hp, max_hp) = sim.player_health();
            let entities = sim.world_mut().entities().len();
            println!(
                "tick {:4}: floor {}, hp {:.0}/{:.0}, {} entities, {} events so far",
                tick,
                sim.floor(),
                hp,
                max_hp,
                entities,
                cue_count
            );
        }

        if sim.is_game_over() {
            println!("☠️ run ended at tick {}", tick);
            break;
        }
    }

    println!("done: victory={}, souls={}", sim.is_victory(), sim.souls());
}
