mod common;
mod routing;
mod sponsorship;
