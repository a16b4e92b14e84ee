use relay_bot_commons::*;

fn main() {
    start_everything("WARN,anon_relay_bot=debug", anon_relay_bot::entry());
}
