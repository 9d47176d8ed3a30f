use ndarray::{array, Array2};
use pinn::autograd::{constant, to_points, variable};
use pinn::operators::{convective, div, grad, jac, laplacian, normal_derivative, partial, rot};
use pinn::{seeded_rng, BoundaryDomain, Circle, Domain, Interval, Rectangle, Space};
use tch::{nn, nn::Module, Device, Kind, Tensor};

fn values(t: &Tensor) -> Vec<f32> {
    Vec::<f32>::try_from(&t.detach().flatten(0, -1)).unwrap()
}

fn assert_close(actual: &Tensor, expected: &[f32], tol: f32) {
    let actual = values(actual);
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() <= tol, "{a} vs {e}\nactual: {actual:?}\nexpected: {expected:?}");
    }
}

fn assert_all(actual: &Tensor, value: f32, tol: f32) {
    for a in values(actual) {
        assert!((a - value).abs() <= tol, "{a} vs {value}");
    }
}

fn row_sum(t: &Tensor) -> Tensor {
    t.sum_dim_intlist([1i64].as_slice(), true, Kind::Float)
}

fn disk_points(n: usize, seed: u64) -> Array2<f32> {
    let disk = Circle::new(Space::var("x", 2), [0.0, 0.0], 1.0).unwrap();
    disk.sample_random_uniform(n, &mut seeded_rng(seed)).unwrap()
}

/// A one-hidden-layer tanh network `R^2 -> R^2`.
fn network(vs: &nn::Path) -> impl Module {
    nn::seq()
        .add(nn::linear(vs / "hidden", 2, 16, Default::default()))
        .add_fn(|x| x.tanh())
        .add(nn::linear(vs / "out", 16, 2, Default::default()))
}

#[test]
fn gradient_and_laplacian_of_a_paraboloid() {
    // u = x1² + x2²: ∇u = (2 x1, 2 x2), Δu = 4.
    let x = variable(array![[1.0f32, 2.0], [0.0, -1.0]].view()).unwrap();
    let u = row_sum(&x.square());

    let g = grad(&u, &[&x]).unwrap();
    assert_close(&g, &[2.0, 4.0, 0.0, -2.0], 1e-6);

    let lap = laplacian(&u, &[&x], Some(&g)).unwrap();
    assert_close(&lap, &[4.0, 4.0], 1e-5);
}

#[test_log::test]
fn laplacian_of_a_linear_function_is_zero() {
    // A linear term has a constant gradient; differentiating again must give
    // zeros rather than fail.
    let x = variable(disk_points(32, 1).view()).unwrap();
    let coeffs = constant(array![[3.0f32], [-2.0]].view()).unwrap();
    let u = x.matmul(&coeffs) + 1.0;

    let lap = laplacian(&u, &[&x], None).unwrap();
    assert_eq!(lap.size(), vec![32, 1]);
    assert_all(&lap, 0.0, 0.0);

    let uxx = partial(&u, &[&x, &x]).unwrap();
    assert_eq!(uxx.size(), vec![32, 2]);
    assert_all(&uxx, 0.0, 0.0);
}

#[test]
fn heat_equation_residual_on_space_time_points() {
    // Real use-case: the residual u_t - Δu of the heat equation for the exact
    // solution u = exp(-2t) sin(x1) sin(x2) vanishes everywhere.
    let square = Rectangle::new(Space::var("x", 2), [0.0, 0.0], 3.0, 3.0).unwrap();
    let time = Interval::new(Space::var("t", 1), 0.0, 1.0).unwrap();
    let domain = (Box::new(square) as Box<dyn Domain> * Box::new(time) as Box<dyn Domain>).unwrap();
    let points = domain.sample_random_uniform(64, &mut seeded_rng(5)).unwrap();
    let parts = domain.divide_points_to_space_variables(points.view()).unwrap();

    let x = variable(parts.get("x").unwrap().view()).unwrap();
    let t = variable(parts.get("t").unwrap().view()).unwrap();
    let u = (&t * -2.0).exp() * x.narrow(1, 0, 1).sin() * x.narrow(1, 1, 1).sin();

    let u_t = partial(&u, &[&t]).unwrap();
    let lap = laplacian(&u, &[&x], None).unwrap();
    assert_all(&(u_t - lap), 0.0, 1e-5);
}

#[test]
fn mixed_partials_agree() {
    // u = x² t³: ∂²u/∂x∂t = ∂²u/∂t∂x = 6 x t².
    let x = variable(array![[1.0f32], [2.0], [-0.5]].view()).unwrap();
    let t = variable(array![[1.0f32], [0.5], [2.0]].view()).unwrap();
    let u = x.square() * t.pow_tensor_scalar(3);

    let expected = [6.0f32, 3.0, -12.0];
    assert_close(&partial(&u, &[&x, &t]).unwrap(), &expected, 1e-5);
    assert_close(&partial(&u, &[&t, &x]).unwrap(), &expected, 1e-5);
}

#[test]
fn divergence_and_curl_of_a_3d_field() {
    let x = variable(array![[1.0f32, 2.0, 3.0], [-1.0, 0.5, 0.0]].view()).unwrap();
    let x1 = x.narrow(1, 0, 1);
    let x2 = x.narrow(1, 1, 1);
    let x3 = x.narrow(1, 2, 1);

    // (x2, x3, x1) has zero divergence and curl (-1, -1, -1)
    let cyclic = Tensor::cat(&[&x2, &x3, &x1], 1);
    assert_all(&div(&cyclic, &[&x]).unwrap(), 0.0, 0.0);
    let curl = rot(&cyclic, &[&x]).unwrap();
    assert_eq!(curl.size(), vec![2, 3]);
    assert_all(&curl, -1.0, 1e-6);

    // (x1², x2², x3²) has divergence 2 (x1 + x2 + x3)
    let divergence = div(&x.square(), &[&x]).unwrap();
    assert_close(&divergence, &[12.0, -1.0], 1e-5);
}

#[test]
fn curl_needs_three_dimensions() {
    let x = variable(array![[1.0f32, 2.0]].view()).unwrap();
    assert!(rot(&x.square(), &[&x]).is_err());
}

#[test]
fn divergence_needs_matching_widths() {
    let x = variable(array![[1.0f32, 2.0]].view()).unwrap();
    let u = row_sum(&x.square());
    assert!(div(&u, &[&x]).is_err());
}

#[test_log::test]
fn jacobian_of_a_network_matches_finite_differences() {
    tch::manual_seed(9);
    let vs = nn::VarStore::new(Device::Cpu);
    let net = network(&vs.root());
    let points = disk_points(8, 9);
    let x = variable(points.view()).unwrap();
    let u = net.forward(&x);

    let j = jac(&u, &[&x]).unwrap();
    assert_eq!(j.size(), vec![8, 2, 2]);

    let eval = |p: Array2<f32>| {
        let out = tch::no_grad(|| net.forward(&constant(p.view()).unwrap()));
        to_points(&out).unwrap()
    };
    let h = 1e-2f32;
    for p in 0..2 {
        let mut plus = points.clone();
        let mut minus = points.clone();
        plus.column_mut(p).mapv_inplace(|v| v + h);
        minus.column_mut(p).mapv_inplace(|v| v - h);
        let diff = (eval(plus) - eval(minus)) / (2.0 * h);
        for n in 0..8 {
            for m in 0..2 {
                let exact = j.double_value(&[n as i64, m as i64, p as i64]) as f32;
                assert!((exact - diff[[n, m]]).abs() < 1e-3, "J[{n}, {m}, {p}]: {exact} vs {}", diff[[n, m]]);
            }
        }
    }
}

#[test]
fn jacobian_over_several_inputs_concatenates_columns() {
    // u = (x t, x + t): J = [[t, x], [1, 1]]
    let x = variable(array![[2.0f32], [3.0]].view()).unwrap();
    let t = variable(array![[5.0f32], [7.0]].view()).unwrap();
    let u = Tensor::cat(&[&x * &t, &x + &t], 1);
    let j = jac(&u, &[&x, &t]).unwrap();
    assert_eq!(j.size(), vec![2, 2, 2]);
    assert_close(&j, &[5.0, 2.0, 1.0, 1.0, 7.0, 3.0, 1.0, 1.0], 1e-6);
}

#[test]
fn partial_stops_once_the_derivative_is_constant() {
    // u = 3 x t is linear in each variable; a third derivative is zero and
    // shaped like the last variable.
    let x = variable(array![[1.0f32], [2.0]].view()).unwrap();
    let t = variable(array![[0.5f32], [4.0]].view()).unwrap();
    let u = (&x * &t) * 3.0;

    assert_all(&partial(&u, &[&x, &t]).unwrap(), 3.0, 1e-6);

    let u_xtx = partial(&u, &[&x, &t, &x]).unwrap();
    assert_eq!(u_xtx.size(), x.size());
    assert_all(&u_xtx, 0.0, 0.0);
}

#[test]
fn normal_derivative_on_the_unit_circle() {
    // u = |x|²: ∂u/∂n = 2 r = 2 on the unit circle.
    let ring = Circle::new(Space::var("x", 2), [0.0, 0.0], 1.0)
        .unwrap()
        .boundary()
        .unwrap();
    let points = ring.sample_random_uniform(40, &mut seeded_rng(3)).unwrap();
    let normals = constant(ring.normal(points.view()).unwrap().view()).unwrap();

    let x = variable(points.view()).unwrap();
    let u = row_sum(&x.square());
    let du_dn = normal_derivative(&u, &normals, &[&x]).unwrap();
    assert_eq!(du_dn.size(), vec![40, 1]);
    assert_all(&du_dn, 2.0, 1e-5);
}

#[test]
fn convective_term_of_the_identity_field() {
    // u = x gives (u · ∇) u = u.
    let points = disk_points(16, 4);
    let x = variable(points.view()).unwrap();
    let u = &x * 1.0;
    let adv = convective(&u, &u, &[&x]).unwrap();
    let expected: Vec<f32> = points.iter().copied().collect();
    assert_close(&adv, &expected, 1e-6);
}

#[test]
fn biharmonic_through_nested_laplacians() {
    // In the plane Δ r⁴ = 16 r² and Δ² r⁴ = 64; the inner laplacian must stay
    // differentiable for the outer one.
    let x = variable(disk_points(16, 8).view()).unwrap();
    let r2 = row_sum(&x.square());
    let u = r2.square();

    let lap = laplacian(&u, &[&x], None).unwrap();
    let expected: Vec<f32> = values(&r2).iter().map(|v| 16.0 * v).collect();
    assert_close(&lap, &expected, 1e-3);

    let bilap = laplacian(&lap, &[&x], None).unwrap();
    assert_all(&bilap, 64.0, 1e-2);
}
