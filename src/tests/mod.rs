mod test_utils;
mod test_dynamics;
mod test_free_flyer;
