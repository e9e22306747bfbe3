pub trait App {
    fn with_defaults(self) -> Self;
}

impl<'a, 'b> App for clap::App<'a, 'b> {
    fn with_defaults(self) -> Self {
        self.arg(
            clap::Arg::with_name("tap")
                .long("tap")
                .value_name("TAP")
                .help("Linux TAP interface")
                .default_value("tap0")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("dev-mac")
                .long("dev-mac")
                .value_name("MAC")
                .help("MAC address of the device")
                .default_value("06:11:22:33:44:55")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("dev-ipv4")
                .long("dev-ipv4")
                .value_name("IPV4")
                .help("IPv4 address of the device")
                .default_value("10.0.0.102")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("pending")
                .long("pending")
                .value_name("N")
                .help("Packets to buffer per unresolved address")
                .default_value("1")
                .takes_value(true),
        )
    }
}
