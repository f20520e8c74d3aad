mod action_factory;

pub use action_factory::BsaActionFactory;
