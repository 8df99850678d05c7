//! CLI interface for Balancer

use clap::{ArgAction, Args, Parser, Subcommand};

use balancer::config::DEFAULT_CLIENT_NAME;

/// Control balance and volume of two audio channels through a MIDI controller
#[derive(Parser)]
#[command(name = "balancer")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Verbosity (-v: verbose, -vv: debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Run options, used when no subcommand is given
    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the balancer (default)
    Run(RunArgs),

    /// List available audio devices and MIDI input ports
    Devices,

    /// Print the precomputed volume and balance curves
    Curves,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// MIDI channel to listen on
    #[arg(short, long, default_value_t = 0)]
    pub channel: u8,

    /// Controller number for volume
    #[arg(long, default_value_t = 7)]
    pub volume_cc: u8,

    /// Controller number for balance
    #[arg(long, default_value_t = 8)]
    pub balance_cc: u8,

    /// Gain factor, i.e. 0.1 for 90 % attenuation
    #[arg(short, long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub gain: f64,

    /// MIDI client name; max. 63 characters. Audio stream clients are
    /// named by the audio backend
    #[arg(short, long, default_value = DEFAULT_CLIENT_NAME)]
    pub name: String,

    /// Connect to the first MIDI input port containing this name
    #[arg(long)]
    pub midi_port: Option<String>,

    /// Audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Audio output device name
    #[arg(long)]
    pub output_device: Option<String>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            channel: 0,
            volume_cc: 7,
            balance_cc: 8,
            gain: 1.0,
            name: DEFAULT_CLIENT_NAME.to_string(),
            midi_port: None,
            input_device: None,
            output_device: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_run() {
        let cli = Cli::try_parse_from(["balancer"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.run.channel, 0);
        assert_eq!(cli.run.name, "balancer");
    }

    #[test]
    fn test_flags_without_subcommand() {
        let cli = Cli::try_parse_from(["balancer", "-c", "3", "-g", "0.5", "--volume-cc", "11", "-v"]).unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.run.channel, 3);
        assert_eq!(cli.run.gain, 0.5);
        assert_eq!(cli.run.volume_cc, 11);
        assert_eq!(cli.run.balance_cc, 8);
    }

    #[test]
    fn test_flags_conflict_with_subcommand() {
        assert!(Cli::try_parse_from(["balancer", "-c", "3", "devices"]).is_err());
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["balancer", "run"]).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };

        let defaults = RunArgs::default();
        assert_eq!(args.channel, defaults.channel);
        assert_eq!(args.volume_cc, defaults.volume_cc);
        assert_eq!(args.balance_cc, defaults.balance_cc);
        assert_eq!(args.gain, defaults.gain);
        assert_eq!(args.name, "balancer");
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "balancer", "run", "-c", "3", "--volume-cc", "11", "--balance-cc", "10", "-g", "0.1", "-n", "mixer", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);

        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.channel, 3);
        assert_eq!(args.volume_cc, 11);
        assert_eq!(args.balance_cc, 10);
        assert_eq!(args.gain, 0.1);
        assert_eq!(args.name, "mixer");
    }

    #[test]
    fn test_negative_gain_reaches_validation() {
        let cli = Cli::try_parse_from(["balancer", "run", "-g", "-1"]).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.gain, -1.0);
    }

    #[test]
    fn test_non_numeric_argument_rejected() {
        assert!(Cli::try_parse_from(["balancer", "run", "-c", "left"]).is_err());
        assert!(Cli::try_parse_from(["balancer", "run", "-g", "loud"]).is_err());
    }

    #[test]
    fn test_devices_command() {
        let cli = Cli::try_parse_from(["balancer", "devices"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Devices)));
    }
}
